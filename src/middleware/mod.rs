/*
 * Responsibility
 * - HTTP middleware for the identifier service
 * - xsrf: Origin / Referer / XSRF header policy for the JSON endpoints
 * - cache_control: no-store for the endpoints, cache policy for static assets
 * - security_headers / http: layers applied to every response
 */
pub mod cache_control;
pub mod http;
pub mod security_headers;
pub mod xsrf;
