//! `bulwark policy`: show the resolved GPU policy.

use crate::adapter::inbound::cli::output;
use crate::application::gpu::GpuPolicy;
use crate::error::Result;

/// Print the policy read from `BULWARK_GPU_*` variables.
pub fn execute() -> Result<()> {
    let policy = GpuPolicy::from_env()?;
    let snapshot = policy.snapshot();

    if output::is_json() {
        output::document("policy", &snapshot)?;
        return Ok(());
    }

    output::section("GPU Policy");
    output::field(
        "Concurrency",
        format!(
            "{} (requested {})",
            output::highlight(snapshot.effective_concurrency),
            snapshot.max_concurrency
        ),
    );
    output::field("Cooldown", format!("{}s", snapshot.cooldown_secs));
    output::field("Wait log threshold", format!("{}s", snapshot.wait_log_threshold_secs));
    output::field("Lock path", &snapshot.lock_path);
    output::field("Lock poll interval", format!("{}s", snapshot.lock_poll_interval_secs));
    output::field(
        "Cross-process lock",
        if snapshot.cross_process_lock { "enabled" } else { "disabled" },
    );
    if policy.cross_process_lock && !snapshot.cross_process_lock {
        output::note("Cross-process locking only applies when max concurrency is 1");
    }

    let runtime = &snapshot.runtime_options;
    output::section("Runtime Options");
    let mut any = false;
    let mut show = |label: &str, value: Option<String>| {
        if let Some(value) = value {
            any = true;
            output::field(label, value);
        }
    };
    show("num_parallel", runtime.num_parallel.map(|v| v.to_string()));
    show("keep_alive", runtime.keep_alive.clone());
    show("num_ctx", runtime.num_ctx.map(|v| v.to_string()));
    show("num_gpu", runtime.num_gpu.map(|v| v.to_string()));
    show("num_thread", runtime.num_thread.map(|v| v.to_string()));
    if !any {
        output::note("None set");
    }

    Ok(())
}
