//! Embedded search UI.
//!
//! The files under `frontend/` are compiled in with `include_str!`, so
//! `roomscout serve` needs no asset directory.

use axum::{Router, http::header, routing::get};

/// One embedded file and the route it is served on.
struct Asset {
    route: &'static str,
    content_type: &'static str,
    body: &'static str,
}

const ASSETS: &[Asset] = &[
    Asset {
        route: "/",
        content_type: "text/html; charset=utf-8",
        body: include_str!("../../../frontend/index.html"),
    },
    Asset {
        route: "/static/style.css",
        content_type: "text/css; charset=utf-8",
        body: include_str!("../../../frontend/style.css"),
    },
    Asset {
        route: "/static/app.js",
        content_type: "application/javascript; charset=utf-8",
        body: include_str!("../../../frontend/app.js"),
    },
];

/// Router serving every embedded asset.
pub fn frontend_router() -> Router {
    ASSETS.iter().fold(Router::new(), |router, asset| {
        let (content_type, body) = (asset.content_type, asset.body);
        router.route(
            asset.route,
            get(move || async move { ([(header::CONTENT_TYPE, content_type)], body) }),
        )
    })
}
