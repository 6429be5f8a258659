use super::{
    colorize_kind, describe_core_error, json_pretty, manager, progress, spin_fail, spin_ok,
    Context, EXIT_SUCCESS,
};
use octave_bridge_core::RuntimeDescriptor;

pub fn run(ctx: &Context, local: bool) -> Result<u8, String> {
    let pb = progress(ctx, "probing Octave runtimes...");
    let mut manager = manager(ctx, &pb);
    if let Err(e) = manager.initialize(!local) {
        spin_fail(&pb, "no Octave runtime");
        return Err(describe_core_error(e));
    }
    spin_ok(&pb, "runtime ready");

    let info = manager.runtime_info();
    if ctx.json {
        println!("{}", json_pretty(&info)?);
    } else {
        print_human(&info);
    }
    Ok(EXIT_SUCCESS)
}

fn probe_label(result: Option<bool>) -> &'static str {
    match result {
        Some(true) => "available",
        Some(false) => "not available",
        None => "not probed",
    }
}

fn print_human(info: &RuntimeDescriptor) {
    let kind = serde_json::to_value(info.kind)
        .ok()
        .and_then(|v| v.as_str().map(str::to_owned))
        .unwrap_or_default();
    println!("runtime:    {}", colorize_kind(&kind));
    if let Some(session) = &info.session {
        println!("session:    {session}");
    }
    println!("docker:     {}", probe_label(info.container_available));
    println!("local:      {}", probe_label(info.local_available));
    println!("verbose:    {}", info.verbose);
}
