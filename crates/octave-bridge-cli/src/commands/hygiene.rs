//! `ps` and `kill`: interpreter processes left behind by earlier calls.

use super::{describe_runtime_error, json_pretty, Context, EXIT_FAILURE, EXIT_SUCCESS};
use octave_bridge_runtime::{
    AvailabilityProbe, ContainerSession, DockerCli, ExecutionSession, LocalSession,
};

/// Attach to the selected backend without creating anything. `None` means
/// there is nothing to inspect (no container, or no local interpreter).
fn attach(ctx: &Context, local: bool) -> Result<Option<Box<dyn ExecutionSession>>, String> {
    let probe = AvailabilityProbe::from_config(&ctx.config);
    if local {
        return match LocalSession::open(&ctx.config, &probe) {
            Ok(session) => Ok(Some(Box::new(session))),
            Err(e) => Err(describe_runtime_error(&e)),
        };
    }
    let docker = DockerCli::connect(&probe).map_err(|e| describe_runtime_error(&e))?;
    let session = ContainerSession::attach_existing(docker, &ctx.config)
        .map_err(|e| describe_runtime_error(&e))?;
    Ok(session.map(|s| Box::new(s) as Box<dyn ExecutionSession>))
}

pub fn ps(ctx: &Context, local: bool) -> Result<u8, String> {
    let processes = match attach(ctx, local)? {
        Some(session) => session.check_running_processes(),
        None => Vec::new(),
    };
    if ctx.json {
        println!("{}", json_pretty(&processes)?);
    } else if processes.is_empty() {
        println!("no Octave processes running");
    } else {
        for line in &processes {
            println!("{line}");
        }
    }
    Ok(EXIT_SUCCESS)
}

pub fn kill(ctx: &Context, local: bool) -> Result<u8, String> {
    let Some(session) = attach(ctx, local)? else {
        println!("nothing to kill");
        return Ok(EXIT_SUCCESS);
    };
    let before = session.check_running_processes();
    let killed = session.kill_running_processes();
    if ctx.json {
        let out = serde_json::json!({ "killed": killed, "processes": before });
        println!("{}", json_pretty(&out)?);
    } else if killed {
        println!("killed {} Octave process(es)", before.len());
    } else {
        eprintln!("could not kill Octave processes");
    }
    Ok(if killed { EXIT_SUCCESS } else { EXIT_FAILURE })
}
