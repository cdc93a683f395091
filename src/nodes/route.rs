//! `route`: first-match dispatch on value or token type.

use crate::graph::{Port, PortId, Topology};
use crate::invariant_ppt::{assert_invariant, ROUTE_OUTLET_COUNT};
use crate::message::{Message, Token};
use crate::node::{DeclareCtx, MessageCtx, NodeDef, NodeError, NodeImpl};
use serde::{Deserialize, Serialize};

/// The `route` node type.
#[derive(Debug, Clone, Copy, Default)]
pub struct Route;

/// Reserved filter words matching on message shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Keyword {
    /// First token is a number.
    Float,
    /// First token is a string.
    Symbol,
    /// More than one token.
    List,
    /// Exactly `bang`.
    Bang,
}

impl Keyword {
    fn parse(s: &str) -> Option<Keyword> {
        match s {
            "float" => Some(Keyword::Float),
            "symbol" => Some(Keyword::Symbol),
            "list" => Some(Keyword::List),
            "bang" => Some(Keyword::Bang),
            _ => None,
        }
    }

    fn matches(self, msg: &Message) -> bool {
        match self {
            Keyword::Float => msg.is_float_token(0),
            Keyword::Symbol => msg.is_symbol_token(0),
            Keyword::List => msg.len() > 1,
            Keyword::Bang => msg.is_bang(),
        }
    }
}

/// One routing filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RouteFilter {
    /// Leading number equal to this value; the token is stripped.
    Float(f64),
    /// Leading string equal to this value; the token is stripped.
    Symbol(String),
    /// Shape match; the message is forwarded whole.
    Keyword(Keyword),
}

impl RouteFilter {
    /// Filter for a construction token.
    pub fn from_token(token: &Token) -> Self {
        match token {
            Token::Float(v) => RouteFilter::Float(*v),
            Token::Symbol(s) => Keyword::parse(s)
                .map(RouteFilter::Keyword)
                .unwrap_or_else(|| RouteFilter::Symbol(s.clone())),
        }
    }

    /// The message to forward if `msg` passes this filter.
    fn apply(&self, msg: &Message) -> Option<Message> {
        match self {
            RouteFilter::Keyword(k) => k.matches(msg).then(|| msg.clone()),
            RouteFilter::Float(v) => {
                (msg.read_float(0) == Some(*v)).then(|| msg.shift().empty_to_bang())
            }
            RouteFilter::Symbol(s) => {
                (msg.read_symbol(0) == Some(s.as_str())).then(|| msg.shift().empty_to_bang())
            }
        }
    }
}

/// Construction arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteArgs {
    /// Filters in match order; `[0]` when none were given.
    pub filters: Vec<Token>,
}

impl NodeDef for Route {
    type Args = RouteArgs;

    fn translate_args(&self, raw: &[Token]) -> Result<RouteArgs, NodeError> {
        let filters = if raw.is_empty() {
            vec![Token::Float(0.0)]
        } else {
            raw.to_vec()
        };
        Ok(RouteArgs { filters })
    }

    fn build(&self, args: &RouteArgs) -> Topology {
        let mut inlets = vec![Port::message(0)];
        if args.filters.len() == 1 {
            inlets.push(Port::message(1));
        }
        let outlets: Vec<Port> = (0..=args.filters.len()).map(Port::message).collect();
        assert_invariant(
            ROUTE_OUTLET_COUNT,
            outlets.len() == args.filters.len() + 1 && outlets.len() >= 2,
            "Router needs one outlet per filter plus a catch-all",
            Some("route"),
        );
        Topology::new(inlets, outlets)
    }

    fn declare(&self, args: &RouteArgs, _ctx: &mut DeclareCtx<'_>) -> Box<dyn NodeImpl> {
        match args.filters.as_slice() {
            [single] => Box::new(SingleRoute {
                filter: single.clone(),
            }),
            filters => Box::new(MultiRoute {
                filters: filters.iter().map(RouteFilter::from_token).collect(),
            }),
        }
    }
}

/// Two or more fixed filters; the last outlet catches everything else.
struct MultiRoute {
    filters: Vec<RouteFilter>,
}

impl NodeImpl for MultiRoute {
    fn message(&mut self, inlet: PortId, msg: &Message, ctx: &mut MessageCtx<'_>) {
        if inlet != PortId::new(0) {
            tracing::debug!(node = "route", %inlet, %msg, "dropped message");
            return;
        }
        for (i, filter) in self.filters.iter().enumerate() {
            if let Some(out) = filter.apply(msg) {
                ctx.send(i, out);
                return;
            }
        }
        ctx.send(self.filters.len(), msg.clone());
    }
}

/// One filter, replaceable at runtime through inlet 1.
struct SingleRoute {
    filter: Token,
}

impl SingleRoute {
    fn apply(&self, msg: &Message) -> Option<Message> {
        match &self.filter {
            Token::Symbol(s) => Keyword::parse(s)
                .and_then(|k| RouteFilter::Keyword(k).apply(msg))
                .or_else(|| RouteFilter::Symbol(s.clone()).apply(msg)),
            Token::Float(v) => RouteFilter::Float(*v).apply(msg),
        }
    }
}

impl NodeImpl for SingleRoute {
    fn message(&mut self, inlet: PortId, msg: &Message, ctx: &mut MessageCtx<'_>) {
        if inlet == PortId::new(1) {
            match msg.get(0) {
                Some(token) => self.filter = token.clone(),
                None => tracing::debug!(node = "route", "empty filter update"),
            }
            return;
        }
        if inlet != PortId::new(0) {
            tracing::debug!(node = "route", %inlet, %msg, "dropped message");
            return;
        }
        match self.apply(msg) {
            Some(out) => ctx.send(0, out),
            None => ctx.send(1, msg.clone()),
        }
    }
}
