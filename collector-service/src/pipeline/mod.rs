use std::{pin::Pin, sync::Arc, time::SystemTime};

use futures::{Stream, StreamExt};

/// A payload plus the instant it left its source.
#[derive(Debug, Clone)]
pub struct Envelope<T> {
    pub payload: T,
    pub fetched_at: SystemTime,
}

impl<T> Envelope<T> {
    pub fn new(payload: T) -> Self {
        Self {
            payload,
            fetched_at: SystemTime::now(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("source error: {0}")]
    Source(String),
    #[error("transform error: {0}")]
    Transform(String),
    #[error("sink error: {0}")]
    Sink(String),
}

pub type EnvelopeStream<T> = Pin<Box<dyn Stream<Item = Result<Envelope<T>, PipelineError>> + Send>>;

#[async_trait::async_trait]
pub trait Source<T>: Send + Sync {
    async fn stream(&self) -> EnvelopeStream<T>;
}

#[async_trait::async_trait]
pub trait Transform<I, O>: Send + Sync {
    async fn apply(&self, input: Envelope<I>) -> Result<Envelope<O>, PipelineError>;
}

#[async_trait::async_trait]
pub trait Sink<T>: Send + Sync {
    async fn run<S>(&self, input: S) -> Result<(), PipelineError>
    where
        S: Stream<Item = Result<Envelope<T>, PipelineError>> + Send + Unpin + 'static;
}

pub struct Pipeline<S, T, K> {
    pub source: S,
    pub transforms: Vec<Arc<dyn Transform<T, T> + Send + Sync>>,
    pub sink: K,
}

impl<T, S, K> Pipeline<S, T, K>
where
    T: Send + 'static,
    S: Source<T> + Send + Sync + 'static,
    K: Sink<T> + Send + Sync + 'static,
{
    /// Drive the source to completion.
    ///
    /// Errors are forwarded untouched: a failed fetch never reaches a
    /// transform, so nothing is derived from it and the sink decides how to
    /// record it.
    pub async fn run(self) -> Result<(), PipelineError> {
        let mut stream = self.source.stream().await;

        for t in self.transforms {
            stream = Box::pin(stream.then(move |item| {
                let t = t.clone();
                async move {
                    match item {
                        Ok(env) => t.apply(env).await,
                        Err(e) => Err(e),
                    }
                }
            }));
        }

        self.sink.run(stream).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct VecSource(Vec<Result<i32, String>>);

    #[async_trait::async_trait]
    impl Source<i32> for VecSource {
        async fn stream(&self) -> EnvelopeStream<i32> {
            let items: Vec<_> = self
                .0
                .iter()
                .cloned()
                .map(|r| r.map(Envelope::new).map_err(PipelineError::Source))
                .collect();
            Box::pin(futures::stream::iter(items))
        }
    }

    struct Double {
        calls: Arc<Mutex<u32>>,
    }

    #[async_trait::async_trait]
    impl Transform<i32, i32> for Double {
        async fn apply(&self, input: Envelope<i32>) -> Result<Envelope<i32>, PipelineError> {
            *self.calls.lock().unwrap() += 1;
            Ok(Envelope {
                payload: input.payload * 2,
                fetched_at: input.fetched_at,
            })
        }
    }

    #[derive(Default)]
    struct Collect {
        ok: Arc<Mutex<Vec<i32>>>,
        errors: Arc<Mutex<u32>>,
    }

    #[async_trait::async_trait]
    impl Sink<i32> for Collect {
        async fn run<S>(&self, mut input: S) -> Result<(), PipelineError>
        where
            S: Stream<Item = Result<Envelope<i32>, PipelineError>> + Send + Unpin + 'static,
        {
            while let Some(item) = input.next().await {
                match item {
                    Ok(env) => self.ok.lock().unwrap().push(env.payload),
                    Err(_) => *self.errors.lock().unwrap() += 1,
                }
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn source_errors_bypass_transforms() {
        let calls = Arc::new(Mutex::new(0));
        let sink = Collect::default();
        let ok = sink.ok.clone();
        let errors = sink.errors.clone();

        let pipeline: Pipeline<_, i32, _> = Pipeline {
            source: VecSource(vec![Ok(1), Err("portal down".to_string()), Ok(3)]),
            transforms: vec![Arc::new(Double { calls: calls.clone() })],
            sink,
        };
        pipeline.run().await.unwrap();

        assert_eq!(*ok.lock().unwrap(), vec![2, 6]);
        assert_eq!(*errors.lock().unwrap(), 1);
        assert_eq!(*calls.lock().unwrap(), 2);
    }
}
