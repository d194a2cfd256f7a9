use async_fn_stream::{try_fn_stream, TryStreamEmitter};
use async_trait::async_trait;
use futures::Stream;
use crate::error::{BatchError, Result};
use crate::message::BatchMessage;

/// Something that runs to completion while reporting progress as messages.
#[async_trait(?Send)]
pub trait PipelineStream {
    async fn run(&mut self, emitter: TryStreamEmitter<BatchMessage, BatchError>) -> Result<()>;

    fn launch(&mut self) -> impl Stream<Item = Result<BatchMessage>> + '_ {
        try_fn_stream(|emitter| async move { self.run(emitter).await })
    }
}
