//! Prompt templates

use serde::Deserialize;

use crate::error::RouteError;
use crate::mcp::router::{HandlerResult, RouteKind, Router};
use crate::mcp::types::{Params, PromptMessage};
use crate::todo::store::TodoStore;
use crate::todo::{parse_args, to_output};

pub fn register(router: &mut Router<TodoStore>) -> Result<(), RouteError> {
    router
        .register("review_code", RouteKind::Prompt, review_code)?
        .with_description("Ask for a review of a code snippet")
        .with_argument("code", "Code to review", true);
    router
        .register("debug_error", RouteKind::Prompt, debug_error)?
        .with_description("Start a debugging conversation about an error")
        .with_argument("error", "Error message being debugged", true);
    Ok(())
}

fn review_code(_: &mut TodoStore, params: Params) -> HandlerResult {
    #[derive(Deserialize)]
    struct Args {
        code: String,
    }

    let args: Args = parse_args(params)?;
    to_output(&[PromptMessage::user(format!(
        "Please review this code:\n\n{}",
        args.code
    ))])
}

fn debug_error(_: &mut TodoStore, params: Params) -> HandlerResult {
    #[derive(Deserialize)]
    struct Args {
        error: String,
    }

    let args: Args = parse_args(params)?;
    to_output(&[
        PromptMessage::user("I'm seeing this error"),
        PromptMessage::user(args.error),
        PromptMessage::assistant("I'll help debug that, what have you tried so far?"),
    ])
}
