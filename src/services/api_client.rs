//! API 客户端
//!
//! 所有后端调用都经过这里：注入 Bearer 令牌，遇到 401 时刷新一次令牌并重放原请求。
//! 刷新失败会清空会话，调用方拿到的是原始的 401 错误。

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::stream::{BoxStream, StreamExt};
use reqwest::header::ACCEPT;
use reqwest::{multipart, Client, Method, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::errors::ClientError;
use crate::models::{RefreshRequest, TokenPair};
use crate::security::{is_present, SessionStore};

/// 数据流字节块
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, ClientError>>;

/// 请求体
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(serde_json::Value),
    /// multipart/form-data 文本字段
    Form(Vec<(String, String)>),
}

/// 待发送的请求（不含认证头）
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: Url,
    pub body: RequestBody,
}

impl ApiRequest {
    pub fn new(method: Method, url: Url, body: RequestBody) -> Self {
        Self { method, url, body }
    }
}

/// 普通响应
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// SSE 长连接响应
pub struct StreamResponse {
    pub status: u16,
    pub body: ByteStream,
}

/// HTTP 传输层
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// 发送请求并读取完整响应体
    async fn send(
        &self,
        request: ApiRequest,
        bearer: Option<SecretString>,
    ) -> Result<ApiResponse, ClientError>;

    /// 建立 text/event-stream 长连接
    async fn open_stream(
        &self,
        request: ApiRequest,
        bearer: Option<SecretString>,
    ) -> Result<StreamResponse, ClientError>;
}

/// 基于 reqwest 的传输实现
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, ClientError> {
        let client = Client::builder()
            .user_agent(concat!("iotboard/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    fn build(&self, request: ApiRequest, bearer: Option<SecretString>) -> reqwest::RequestBuilder {
        let mut builder = self.client.request(request.method, request.url);

        if let Some(token) = bearer {
            builder = builder.bearer_auth(token.expose_secret());
        }

        match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Form(fields) => {
                let form = fields
                    .into_iter()
                    .fold(multipart::Form::new(), |form, (name, value)| form.text(name, value));
                builder.multipart(form)
            }
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(
        &self,
        request: ApiRequest,
        bearer: Option<SecretString>,
    ) -> Result<ApiResponse, ClientError> {
        let response = self.build(request, bearer).send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();
        Ok(ApiResponse { status, body })
    }

    async fn open_stream(
        &self,
        request: ApiRequest,
        bearer: Option<SecretString>,
    ) -> Result<StreamResponse, ClientError> {
        let response = self
            .build(request, bearer)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()).map_err(ClientError::from))
            .boxed();
        Ok(StreamResponse { status, body })
    }
}

/// 单个请求的认证状态
///
/// `AwaitingRefresh -> Retried` 最多发生一次；处于 `Retried` 时再收到 401 直接失败。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Pending,
    AwaitingRefresh,
    Retried,
    Failed,
}

impl RequestState {
    /// 收到 401 后的状态
    pub fn on_unauthorized(self) -> Self {
        match self {
            RequestState::Pending => RequestState::AwaitingRefresh,
            _ => RequestState::Failed,
        }
    }

    /// 刷新结束后的状态
    pub fn on_refreshed(self, ok: bool) -> Self {
        match (self, ok) {
            (RequestState::AwaitingRefresh, true) => RequestState::Retried,
            _ => RequestState::Failed,
        }
    }
}

/// 可以参与刷新重试的响应
trait Attempted: Send {
    fn status(&self) -> u16;
    fn error_body(&self) -> &[u8];
}

impl Attempted for ApiResponse {
    fn status(&self) -> u16 {
        self.status
    }
    fn error_body(&self) -> &[u8] {
        &self.body
    }
}

impl Attempted for StreamResponse {
    fn status(&self) -> u16 {
        self.status
    }
    fn error_body(&self) -> &[u8] {
        &[]
    }
}

/// 在基础地址后追加路径段和查询参数
///
/// 路径段会被百分号编码，设备 ID 或传感器类型中的特殊字符不会破坏路径。
pub fn build_url(base: &Url, segments: &[&str], query: &[(&str, String)]) -> Result<Url, ClientError> {
    let mut url = base.clone();
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| ClientError::Config(format!("无效的 API 基础地址: {}", base)))?;
        path.pop_if_empty();
        path.extend(segments);
    }
    if !query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in query {
            pairs.append_pair(key, value);
        }
    }
    Ok(url)
}

/// API 客户端
pub struct ApiClient {
    base_url: Url,
    transport: Arc<dyn HttpTransport>,
    session: Arc<SessionStore>,
}

impl ApiClient {
    pub fn new(
        base_url: &str,
        transport: Arc<dyn HttpTransport>,
        session: Arc<SessionStore>,
    ) -> Result<Self, ClientError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ClientError::Config(format!("无效的 API 基础地址 {}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::Config(format!("无效的 API 基础地址: {}", base_url)));
        }

        Ok(Self {
            base_url,
            transport,
            session,
        })
    }

    /// 使用 reqwest 传输创建客户端
    pub fn with_reqwest(base_url: &str, session: Arc<SessionStore>) -> Result<Self, ClientError> {
        Self::new(base_url, Arc::new(ReqwestTransport::new()?), session)
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn endpoint(&self, segments: &[&str], query: &[(&str, String)]) -> Result<Url, ClientError> {
        build_url(&self.base_url, segments, query)
    }

    /// 执行请求，非 2xx 状态转换为错误
    pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        let response = self
            .drive(&request, |req, bearer| self.transport.send(req, bearer))
            .await?;

        if !response.is_success() {
            return Err(ClientError::from_status(response.status, &response.body));
        }
        Ok(response)
    }

    /// 打开 SSE 长连接，握手同样经过刷新重试流程
    pub async fn open_stream(&self, segments: &[&str]) -> Result<ByteStream, ClientError> {
        let request = ApiRequest::new(Method::GET, self.endpoint(segments, &[])?, RequestBody::Empty);
        let response = self
            .drive(&request, |req, bearer| self.transport.open_stream(req, bearer))
            .await?;

        if !(200..300).contains(&response.status) {
            let body: Vec<u8> = response
                .body
                .filter_map(|chunk| async move { chunk.ok() })
                .concat()
                .await;
            return Err(ClientError::from_status(response.status, &body));
        }
        Ok(response.body)
    }

    /// GET 并解析 JSON
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<T, ClientError> {
        let request = ApiRequest::new(Method::GET, self.endpoint(segments, query)?, RequestBody::Empty);
        let response = self.execute(request).await?;
        Ok(serde_json::from_slice(&response.body)?)
    }

    /// GET 并解析 JSON，空响应体或 `null` 返回 None
    pub async fn get_optional<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<Option<T>, ClientError> {
        let request = ApiRequest::new(Method::GET, self.endpoint(segments, query)?, RequestBody::Empty);
        let response = self.execute(request).await?;
        if response.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        Ok(serde_json::from_slice(&response.body)?)
    }

    /// POST JSON 并解析 JSON 响应
    pub async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> Result<T, ClientError> {
        let request = ApiRequest::new(
            Method::POST,
            self.endpoint(segments, &[])?,
            RequestBody::Json(serde_json::to_value(body)?),
        );
        let response = self.execute(request).await?;
        Ok(serde_json::from_slice(&response.body)?)
    }

    /// 变更类请求，任何 2xx 都视为成功
    pub async fn mutate(
        &self,
        method: Method,
        segments: &[&str],
        body: RequestBody,
    ) -> Result<(), ClientError> {
        let request = ApiRequest::new(method, self.endpoint(segments, &[])?, body);
        let response = self.execute(request).await?;
        if response.status != 204 {
            debug!(status = response.status, url = %request_path(segments), "变更请求返回非 204 成功状态");
        }
        Ok(())
    }

    /// 按状态机执行一次请求，必要时刷新令牌并重放一次
    async fn drive<'a, R, F>(&'a self, request: &ApiRequest, attempt: F) -> Result<R, ClientError>
    where
        R: Attempted,
        F: Fn(ApiRequest, Option<SecretString>) -> BoxFuture<'a, Result<R, ClientError>>,
    {
        let mut state = RequestState::Pending;

        loop {
            let response = attempt(request.clone(), self.session.access_token()).await?;
            if response.status() != 401 {
                return Ok(response);
            }

            let original = ClientError::from_status(401, response.error_body());
            state = state.on_unauthorized();
            if state == RequestState::Failed {
                debug!(url = %request.url, "重试后仍未授权");
                return Err(original);
            }

            debug!(url = %request.url, "访问令牌失效，尝试刷新");
            match self.refresh().await {
                Ok(()) => {
                    state = state.on_refreshed(true);
                }
                Err(e) => {
                    state = state.on_refreshed(false);
                    warn!(error = %e, state = ?state, "刷新令牌失败，清除会话");
                    self.session.clear();
                    return Err(original);
                }
            }
        }
    }

    /// 用当前令牌对换取新令牌（不附带 Bearer，也不参与重试）
    async fn refresh(&self) -> Result<(), ClientError> {
        // 两个令牌缺一不可，缺失时直接走清除会话的路径
        let refresh_token = self
            .session
            .refresh_token()
            .filter(is_present)
            .ok_or_else(|| ClientError::Unauthorized("缺少刷新令牌".to_string()))?;
        let access_token = self
            .session
            .access_token()
            .filter(is_present)
            .ok_or_else(|| ClientError::Unauthorized("缺少访问令牌".to_string()))?;

        let body = RefreshRequest {
            refresh_token: refresh_token.expose_secret().clone(),
            access_token: access_token.expose_secret().clone(),
        };
        let request = ApiRequest::new(
            Method::POST,
            self.endpoint(&["auth", "refresh"], &[])?,
            RequestBody::Json(serde_json::to_value(&body)?),
        );

        let response = self.transport.send(request, None).await?;
        if !response.is_success() {
            return Err(ClientError::from_status(response.status, &response.body));
        }

        let tokens: TokenPair = serde_json::from_slice(&response.body)?;
        self.session.save(tokens)?;
        info!("访问令牌已刷新");
        Ok(())
    }
}

fn request_path(segments: &[&str]) -> String {
    format!("/{}", segments.join("/"))
}
