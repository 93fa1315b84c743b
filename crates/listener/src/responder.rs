//! Conversion of handler return values into responses.

use bytes::Bytes;
use http::{HeaderValue, Response, StatusCode, header};
use mime::Mime;

use crate::body::ResponseBody;

/// A value a [`RequestHandler`](crate::RequestHandler) closure may return.
pub trait Responder {
    fn into_response(self) -> Response<ResponseBody>;
}

impl<B> Responder for Response<B>
where
    B: Into<ResponseBody>,
{
    fn into_response(self) -> Response<ResponseBody> {
        self.map(Into::into)
    }
}

/// An empty response with the given status.
impl Responder for StatusCode {
    fn into_response(self) -> Response<ResponseBody> {
        let mut response = Response::new(ResponseBody::empty());
        *response.status_mut() = self;
        response
    }
}

impl<T: Responder> Responder for (StatusCode, T) {
    fn into_response(self) -> Response<ResponseBody> {
        let (status, responder) = self;
        let mut response = responder.into_response();
        *response.status_mut() = status;
        response
    }
}

impl<T: Responder> Responder for Option<T> {
    fn into_response(self) -> Response<ResponseBody> {
        match self {
            Some(responder) => responder.into_response(),
            None => StatusCode::NOT_FOUND.into_response(),
        }
    }
}

impl Responder for () {
    fn into_response(self) -> Response<ResponseBody> {
        Response::new(ResponseBody::empty())
    }
}

impl Responder for &'static str {
    fn into_response(self) -> Response<ResponseBody> {
        text_response(ResponseBody::from(self))
    }
}

impl Responder for String {
    fn into_response(self) -> Response<ResponseBody> {
        text_response(ResponseBody::from(self))
    }
}

impl Responder for Bytes {
    fn into_response(self) -> Response<ResponseBody> {
        with_content_type(ResponseBody::from(self), &mime::APPLICATION_OCTET_STREAM)
    }
}

fn text_response(body: ResponseBody) -> Response<ResponseBody> {
    with_content_type(body, &mime::TEXT_PLAIN_UTF_8)
}

fn with_content_type(body: ResponseBody, content_type: &Mime) -> Response<ResponseBody> {
    let mut response = Response::new(body);
    if let Ok(value) = HeaderValue::from_str(content_type.as_ref()) {
        response.headers_mut().insert(header::CONTENT_TYPE, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use http_body::Body;

    use super::*;

    #[test]
    fn text_gets_content_type() {
        let response = "hello".into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain; charset=utf-8");
        assert_eq!(response.body().size_hint().exact(), Some(5));
    }

    #[test]
    fn status_overrides() {
        let response = (StatusCode::CREATED, String::from("made")).into_response();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = StatusCode::NO_CONTENT.into_response();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(response.body().is_end_stream());

        let response = None::<String>.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
