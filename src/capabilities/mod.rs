mod http;
mod kv;
mod navigate;

pub use self::http::{
    BlobRef, HttpBody, HttpError, HttpHeaders, HttpMethod, HttpOperation, HttpRequest,
    HttpResponse, HttpResult, ValidatedUrl,
};
pub use self::kv::{
    decode_stored, encode_stored, KeyNamespace, KvError, KvKey, KvOperation, KvOutput, KvResult,
};
pub use self::navigate::NavigateOperation;

pub use crux_core::render::Render;

use crate::event::Event;

pub type AppHttp = http::Http<Event>;
pub type AppKv = kv::KeyValue<Event>;
pub type AppNavigate = navigate::Navigate<Event>;
pub type AppRender = Render<Event>;

#[derive(crux_core::macros::Effect)]
pub struct Capabilities {
    pub render: Render<Event>,
    pub http: http::Http<Event>,
    pub key_value: kv::KeyValue<Event>,
    pub navigate: navigate::Navigate<Event>,
}
