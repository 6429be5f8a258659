//! Assembly of the script text handed to the interpreter.
//!
//! Layout, in order: persistent commands, argument assignments, transient
//! commands, the call statement, and the save statement that writes the
//! requested variables to the exchange file as JSON.

use crate::commands::CommandBuffer;
use crate::marshal::{literal, normalize_text, quote};
use crate::request::InvocationRequest;

/// Workspace variable holding the struct that is serialized to the exchange file.
pub const EXCHANGE_VAR: &str = "bridge_exchange";
const FID_VAR: &str = "bridge_fid";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedScript {
    pub assignments: Vec<String>,
    pub call: String,
    pub save: String,
    pub text: String,
}

pub struct ScriptBuilder<'a> {
    commands: &'a CommandBuffer,
    exchange_path: String,
}

impl<'a> ScriptBuilder<'a> {
    /// `exchange_path` is interpreted by the interpreter relative to its
    /// working directory (the workspace root).
    pub fn new(commands: &'a CommandBuffer, exchange_path: &str) -> Self {
        Self {
            commands,
            exchange_path: normalize_text(exchange_path),
        }
    }

    pub fn build(&self, request: &InvocationRequest) -> GeneratedScript {
        let mut arg_vars = Vec::with_capacity(request.arguments.len());
        let mut assignments = Vec::with_capacity(request.arguments.len());
        for (i, arg) in request.arguments.iter().enumerate() {
            let var = format!("arg{i}");
            assignments.push(format!("{var} = {};", literal(arg)));
            arg_vars.push(var);
        }

        let outputs: Vec<String> = request
            .result_vars()
            .into_iter()
            .map(String::from)
            .collect();
        let call = format!(
            "[{}] = {}({});",
            outputs.join(", "),
            request.function,
            arg_vars.join(", ")
        );

        let save = self.save_statement(request);

        let mut lines: Vec<&str> = Vec::new();
        lines.extend(self.commands.persistent().iter().map(String::as_str));
        lines.extend(assignments.iter().map(String::as_str));
        lines.extend(self.commands.transient().iter().map(String::as_str));
        lines.push(&call);
        lines.push(&save);
        let mut text = lines.join("\n");
        text.push('\n');

        GeneratedScript {
            assignments,
            call,
            save,
            text,
        }
    }

    fn save_statement(&self, request: &InvocationRequest) -> String {
        let fields: Vec<String> = request
            .saved_vars()
            .iter()
            .map(|v| format!("{EXCHANGE_VAR}.{v} = {v};"))
            .collect();
        let path = quote(&self.exchange_path);
        format!(
            "{EXCHANGE_VAR} = struct(); {} \
             {FID_VAR} = fopen({path}, 'w'); \
             if {FID_VAR} < 0, error('octave-bridge: cannot open %s', {path}); end; \
             fputs({FID_VAR}, jsonencode({EXCHANGE_VAR})); fclose({FID_VAR});",
            fields.join(" ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ArgumentValue;

    const EXCHANGE: &str = ".octave-bridge/result.json";

    fn request() -> InvocationRequest {
        InvocationRequest::new("sim_lcmrawbasis")
            .unwrap()
            .arg(4096)
            .arg("./data/S01.SPAR")
            .arg(true)
            .arg(Option::<f64>::None)
    }

    #[test]
    fn assignments_use_positional_variables() {
        let commands = CommandBuffer::new();
        let script = ScriptBuilder::new(&commands, EXCHANGE).build(&request());
        assert_eq!(
            script.assignments,
            vec![
                "arg0 = 4096;",
                "arg1 = 'data/S01.SPAR';",
                "arg2 = 1;",
                "arg3 = [];"
            ]
        );
        assert_eq!(
            script.call,
            "[result] = sim_lcmrawbasis(arg0, arg1, arg2, arg3);"
        );
    }

    #[test]
    fn absent_argument_is_empty_array_in_script_text() {
        let commands = CommandBuffer::new();
        let req = InvocationRequest::new("f").unwrap().arg(ArgumentValue::Absent);
        let script = ScriptBuilder::new(&commands, EXCHANGE).build(&req);
        assert!(script.text.contains("arg0 = [];\n"));
    }

    #[test]
    fn sections_appear_in_protocol_order() {
        let mut commands = CommandBuffer::new();
        commands.eval("warning('off', 'all');");
        commands.add_path("./externals/fidA/inputOutput/");
        commands.push_transient("tmp = 3;");
        let script = ScriptBuilder::new(&commands, EXCHANGE).build(&request());

        let pos = |needle: &str| script.text.find(needle).unwrap();
        assert!(pos("warning('off'") < pos("addpath('externals/fidA"));
        assert!(pos("addpath('externals/fidA") < pos("arg0 = 4096;"));
        assert!(pos("arg3 = [];") < pos("tmp = 3;"));
        assert!(pos("tmp = 3;") < pos("[result] = sim_lcmrawbasis"));
        assert!(pos("[result] = sim_lcmrawbasis") < pos("jsonencode"));
        assert!(script.text.ends_with('\n'));
    }

    #[test]
    fn multiple_outputs_saved_to_exchange_file() {
        let commands = CommandBuffer::new();
        let req = InvocationRequest::new("size").unwrap().arg(1.0).outputs(2);
        let script = ScriptBuilder::new(&commands, EXCHANGE).build(&req);
        assert_eq!(script.call, "[result0, result1] = size(arg0);");
        assert!(script
            .save
            .contains("bridge_exchange.result0 = result0; bridge_exchange.result1 = result1;"));
        assert!(script.save.contains("fopen('.octave-bridge/result.json', 'w')"));
    }

    #[test]
    fn store_as_saves_only_named_variable() {
        let commands = CommandBuffer::new();
        let req = InvocationRequest::new("f").unwrap().store_as("basis").unwrap();
        let script = ScriptBuilder::new(&commands, EXCHANGE).build(&req);
        assert!(script.save.contains("bridge_exchange.basis = basis;"));
        assert!(!script.save.contains("bridge_exchange.result"));
    }

    #[test]
    fn no_arguments_produces_empty_call() {
        let commands = CommandBuffer::new();
        let req = InvocationRequest::new("pi").unwrap();
        let script = ScriptBuilder::new(&commands, EXCHANGE).build(&req);
        assert_eq!(script.call, "[result] = pi();");
        assert!(script.assignments.is_empty());
    }

    #[test]
    fn exchange_path_is_normalized() {
        let commands = CommandBuffer::new();
        let req = InvocationRequest::new("pi").unwrap();
        let script = ScriptBuilder::new(&commands, ".\\shared\\result.json").build(&req);
        assert!(script.save.contains("'shared/result.json'"));
    }
}
