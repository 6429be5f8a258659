use super::{describe_runtime_error, Context, EXIT_SUCCESS};
use octave_bridge_runtime::{AvailabilityProbe, ContainerSession, DockerCli, ExecutionSession};

pub fn run(ctx: &Context) -> Result<u8, String> {
    let probe = AvailabilityProbe::from_config(&ctx.config);
    let docker = DockerCli::connect(&probe).map_err(|e| describe_runtime_error(&e))?;
    let name = &ctx.config.container_name;
    match ContainerSession::attach_existing(docker, &ctx.config)
        .map_err(|e| describe_runtime_error(&e))?
    {
        Some(mut session) => {
            session.teardown().map_err(|e| describe_runtime_error(&e))?;
            println!("stopped and removed container {name}");
        }
        None => println!("no container named {name}"),
    }
    Ok(EXIT_SUCCESS)
}
