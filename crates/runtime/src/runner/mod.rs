//! Runner adapters.
//!
//! The runner decides *where* one attempt executes: inline in the worker,
//! or in a container speaking the JSON stdin / NDJSON stdout wire format.
//! The remote runner is reserved.

pub mod container;

use palisade_component::{ActivityContext, Component, ComponentError, ExecuteRequest, RunnerSpec};
use serde_json::{Value, json};

pub use container::CommandSpec;

/// Execute one attempt through the component's declared runner.
pub async fn dispatch(
    component: &dyn Component,
    runner: &RunnerSpec,
    request: ExecuteRequest,
    ctx: &ActivityContext,
) -> Result<Value, ComponentError> {
    match runner {
        RunnerSpec::Inline => component.execute(request, ctx).await,
        RunnerSpec::Container { image, command, .. } => {
            let payload = json!({
                "inputs": request.inputs,
                "params": request.params,
                "context": {
                    "runId": ctx.run_id,
                    "componentRef": ctx.component_ref,
                    "attempt": ctx.attempt,
                },
            });
            let launch = CommandSpec::docker(image, command);
            container::run(launch, payload, &ctx.cancellation, |event| {
                ctx.emit_progress(event);
            })
            .await
        }
        RunnerSpec::Remote => Err(ComponentError::configuration(
            "remote runner is reserved and not available on this worker",
        )),
    }
}
