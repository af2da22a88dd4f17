//! Scripted [`AnnotationService`] for unit tests.

use crate::client::AnnotationService;
use crate::error::ServiceError;
use serde_json::Value;
use std::cell::RefCell;

type GetHandler = Box<dyn Fn(&str) -> Result<Value, ServiceError>>;
type PostHandler = Box<dyn Fn(&Value) -> Result<Value, ServiceError>>;

pub(crate) struct FakeService {
    pub gets: RefCell<Vec<String>>,
    pub posts: RefCell<Vec<Value>>,
    get_handler: GetHandler,
    post_handler: PostHandler,
}

impl FakeService {
    pub fn new(
        get_handler: impl Fn(&str) -> Result<Value, ServiceError> + 'static,
        post_handler: impl Fn(&Value) -> Result<Value, ServiceError> + 'static,
    ) -> FakeService {
        FakeService {
            gets: RefCell::new(Vec::new()),
            posts: RefCell::new(Vec::new()),
            get_handler: Box::new(get_handler),
            post_handler: Box::new(post_handler),
        }
    }

    pub fn http_error(status: u16, url: &str) -> ServiceError {
        ServiceError::RemoteService {
            status,
            url: url.to_string(),
        }
    }
}

impl AnnotationService for FakeService {
    fn get(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<Value, ServiceError> {
        let query = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        let call = if query.is_empty() {
            endpoint.to_string()
        } else {
            format!("{}?{}", endpoint, query)
        };
        self.gets.borrow_mut().push(call.clone());
        (self.get_handler)(&call)
    }

    fn post_batch(&self, _endpoint: &str, body: &Value) -> Result<Value, ServiceError> {
        self.posts.borrow_mut().push(body.clone());
        (self.post_handler)(body)
    }
}
