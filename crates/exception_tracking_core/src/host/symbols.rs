//! Well-known host symbol names.

/// Library providing the MVC pipeline.
pub const MVC_LIBRARY: &str = "web_mvc";
/// Library providing per-request host state.
pub const CORE_LIBRARY: &str = "web_core";
/// Library providing the Web API pipeline.
pub const WEBAPI_LIBRARY: &str = "web_http";
/// Library hosting the Web API global configuration.
pub const WEBAPI_HOST_LIBRARY: &str = "web_http_host";

pub const MVC_HANDLE_ERROR_FILTER: &str = "web_mvc::HandleErrorFilter";
pub const MVC_GLOBAL_FILTERS: &str = "web_mvc::GlobalFilters";
pub const MVC_CONTEXT_EXCEPTION: &str = "web_mvc::ExceptionContext::exception";
pub const MVC_CONTEXT_HTTP_CONTEXT: &str = "web_mvc::ExceptionContext::http_context";
pub const HTTP_CONTEXT_CUSTOM_ERRORS: &str = "web_core::HttpContext::is_custom_error_enabled";

pub const WEBAPI_EXCEPTION_LOGGER: &str = "web_http::ExceptionLogger";
pub const WEBAPI_CONTEXT_EXCEPTION: &str = "web_http::ExceptionLoggerContext::exception";
pub const WEBAPI_EXCEPTION_LOGGERS: &str = "web_http_host::ExceptionLoggers";
