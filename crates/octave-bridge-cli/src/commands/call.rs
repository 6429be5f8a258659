use super::{
    describe_core_error, describe_runtime_error, json_pretty, manager, progress, spin_fail,
    spin_ok, Context, EXIT_FAILURE, EXIT_SUCCESS,
};
use octave_bridge_core::interrupt_requested;
use octave_bridge_script::{genpath, ArgumentValue, InvocationRequest};

pub struct CallOptions<'a> {
    pub function: &'a str,
    pub args: &'a [String],
    pub nout: usize,
    pub store_as: Option<&'a str>,
    pub paths: &'a [String],
    pub genpaths: &'a [String],
    pub evals: &'a [String],
    pub local: bool,
}

/// Each argument is parsed as JSON; anything that is not valid JSON is
/// passed as text, so `call disp hello` works without quoting.
pub fn parse_argument(raw: &str) -> Result<ArgumentValue, String> {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(json) => ArgumentValue::try_from(json).map_err(|e| e.to_string()),
        Err(_) => Ok(ArgumentValue::Text(raw.to_owned())),
    }
}

pub fn build_request(opts: &CallOptions<'_>) -> Result<InvocationRequest, String> {
    let mut request = InvocationRequest::new(opts.function).map_err(|e| e.to_string())?;
    for (i, raw) in opts.args.iter().enumerate() {
        let arg = parse_argument(raw).map_err(|e| format!("argument {}: {e}", i + 1))?;
        request = request.arg(arg);
    }
    request = request.outputs(opts.nout);
    if let Some(name) = opts.store_as {
        request = request.store_as(name).map_err(|e| e.to_string())?;
    }
    Ok(request)
}

pub fn run(ctx: &Context, opts: &CallOptions<'_>) -> Result<u8, String> {
    let request = build_request(opts)?;

    let pb = progress(ctx, "preparing Octave runtime...");
    let mut manager = manager(ctx, &pb);
    let session = match manager.initialize(!opts.local) {
        Ok(session) => session,
        Err(e) => {
            spin_fail(&pb, "no Octave runtime");
            return Err(describe_core_error(e));
        }
    };

    let mut session = session
        .lock()
        .map_err(|_| "session lock poisoned".to_owned())?;
    spin_ok(&pb, &session.describe());

    for path in opts.paths {
        session.add_path(path);
    }
    for path in opts.genpaths {
        session.add_path(&genpath(path));
    }
    for statement in opts.evals {
        session.push_transient(statement);
    }

    let pb = progress(ctx, &format!("calling {}...", request.function));
    let result = match session.invoke(&request) {
        Ok(result) => {
            spin_ok(&pb, &format!("{} returned", request.function));
            result
        }
        Err(e) => {
            spin_fail(&pb, &format!("{} failed", request.function));
            return Err(describe_runtime_error(&e));
        }
    };

    if ctx.json {
        let out = serde_json::json!({
            "function": request.function.as_str(),
            "backend": session.kind(),
            "result": result.to_json(),
        });
        println!("{}", json_pretty(&out)?);
    } else {
        println!("{}", json_pretty(&result.to_json())?);
    }

    if interrupt_requested() {
        eprintln!("interrupted");
        return Ok(EXIT_FAILURE);
    }
    Ok(EXIT_SUCCESS)
}
