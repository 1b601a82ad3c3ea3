//! 业务服务层（Service）
//!
//! 每个后端资源一个服务，全部通过 [`ApiClient`] 发出请求。

mod alert_service;
mod api_client;
mod auth_service;
mod device_service;
mod event_service;
mod forecast_service;
mod sensor_service;
mod threshold_service;

pub use alert_service::AlertService;
pub use api_client::{
    build_url, ApiClient, ApiRequest, ApiResponse, ByteStream, HttpTransport, RequestBody,
    RequestState, ReqwestTransport, StreamResponse,
};
pub use auth_service::AuthService;
pub use device_service::DeviceService;
pub use event_service::EventService;
pub use forecast_service::ForecastService;
pub use sensor_service::SensorService;
pub use threshold_service::ThresholdService;
