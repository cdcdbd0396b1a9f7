/**
* filename : mod
* author : HAMA
* date: 2025. 6. 2.
* description: HTTP 명령 게이트웨이
**/

pub mod handlers;
pub mod models;
pub mod routes;

pub use routes::create_api_router;
