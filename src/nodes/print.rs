//! `print`: logs every inbound message with a prefix.

use crate::graph::{Port, PortId, Topology};
use crate::message::{Message, Token};
use crate::node::{DeclareCtx, MessageCtx, NodeDef, NodeError, NodeImpl};
use serde::{Deserialize, Serialize};

/// The `print` node type.
#[derive(Debug, Clone, Copy, Default)]
pub struct Print;

/// Construction arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintArgs {
    /// Text logged before each message.
    pub prefix: String,
}

impl NodeDef for Print {
    type Args = PrintArgs;

    fn translate_args(&self, raw: &[Token]) -> Result<PrintArgs, NodeError> {
        let prefix = match raw {
            [] => "print:".to_string(),
            [Token::Symbol(flag)] if flag == "-n" => String::new(),
            tokens => {
                let words: Vec<String> = tokens.iter().map(Token::to_string).collect();
                format!("{}:", words.join(" "))
            }
        };
        Ok(PrintArgs { prefix })
    }

    fn build(&self, _args: &PrintArgs) -> Topology {
        Topology::new(vec![Port::message(0)], vec![])
    }

    fn declare(&self, args: &PrintArgs, _ctx: &mut DeclareCtx<'_>) -> Box<dyn NodeImpl> {
        Box::new(PrintImpl {
            prefix: args.prefix.clone(),
        })
    }
}

struct PrintImpl {
    prefix: String,
}

impl PrintImpl {
    fn line(&self, msg: &Message) -> String {
        format!("{} {}", self.prefix, msg)
    }
}

impl NodeImpl for PrintImpl {
    fn message(&mut self, _inlet: PortId, msg: &Message, _ctx: &mut MessageCtx<'_>) {
        tracing::info!(target: "patchcore::print", "{}", self.line(msg));
    }
}
