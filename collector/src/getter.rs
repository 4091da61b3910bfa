use crate::{
    prometheus::{
        QueryApi,
        QueryError,
        QueryResponse,
    },
    query::QueryDescriptor,
};
use chrono::Utc;
use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
};

/// A measurement that can be executed against the backend.
pub trait Getter: Send + Sync {
    /// Aggregation key, unique within one collector.
    fn name(&self) -> &str;

    /// Runs the query once, evaluated at the current time. No retries.
    fn execute(&self) -> Pin<Box<dyn Future<Output = Result<QueryResponse, QueryError>> + Send + '_>>;

    /// One of `memory`, `percentage` or `simple`.
    fn result_kind(&self) -> &str;
}

/// Binds a [`QueryDescriptor`] to a shared backend client.
#[derive(Clone)]
pub struct QueryGetter {
    api: Arc<dyn QueryApi>,
    descriptor: QueryDescriptor,
}

impl QueryGetter {
    pub fn new(api: Arc<dyn QueryApi>, descriptor: QueryDescriptor) -> Self {
        Self { api, descriptor }
    }
}

impl std::fmt::Debug for QueryGetter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryGetter")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

impl Getter for QueryGetter {
    fn name(&self) -> &str {
        self.descriptor.name()
    }

    fn execute(&self) -> Pin<Box<dyn Future<Output = Result<QueryResponse, QueryError>> + Send + '_>> {
        self.api.query(self.descriptor.query(), Utc::now())
    }

    fn result_kind(&self) -> &str {
        self.descriptor.result_kind()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        prometheus::Sample,
        query::ResultKind,
    };
    use chrono::DateTime;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingApi {
        seen: Mutex<Vec<(String, DateTime<Utc>)>>,
    }

    impl QueryApi for RecordingApi {
        fn query<'a>(
            &'a self,
            query: &'a str,
            time: DateTime<Utc>,
        ) -> Pin<Box<dyn Future<Output = Result<QueryResponse, QueryError>> + Send + 'a>> {
            self.seen.lock().unwrap().push((query.to_string(), time));
            Box::pin(async { Ok(QueryResponse::new(vec![Sample::new(1.0)])) })
        }
    }

    #[tokio::test]
    async fn executes_descriptor_query_now() {
        let api = Arc::new(RecordingApi::default());
        let getter = QueryGetter::new(
            api.clone(),
            QueryDescriptor::new("up", "up{job=\"etcd\"}", ResultKind::Simple),
        );
        assert_eq!(getter.name(), "up");
        assert_eq!(getter.result_kind(), "simple");

        let before = Utc::now();
        let response = getter.execute().await.unwrap();
        assert_eq!(response.vector.len(), 1);

        let seen = api.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "up{job=\"etcd\"}");
        assert!(seen[0].1 >= before);
    }
}
