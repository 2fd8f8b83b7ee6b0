// src/handlers/query.rs
use actix_web::{web, HttpRequest, HttpResponse};
use log::{debug, error, warn};
use serde::{Deserialize, Serialize};
use crate::config::Config;
use crate::proxies::TrustedProxies;
use crate::ratelimit::RequestQuota;
use crate::service::QueryService;
use crate::utils::{extract_client_id, RequestError};

#[derive(Debug, Default, Deserialize)]
pub struct QueryParams {
    #[serde(alias = "host")]
    ip: Option<String>,
    port: Option<String>,
}

pub async fn query_get(
    req: HttpRequest,
    params: web::Query<QueryParams>,
    service: web::Data<QueryService>,
    proxies: web::Data<TrustedProxies>,
    quota: web::Data<RequestQuota>,
    config: web::Data<Config>,
) -> Result<HttpResponse, RequestError> {
    respond(&req, params.into_inner(), &service, &proxies, &quota, &config).await
}

pub async fn query_post(
    req: HttpRequest,
    params: web::Form<QueryParams>,
    service: web::Data<QueryService>,
    proxies: web::Data<TrustedProxies>,
    quota: web::Data<RequestQuota>,
    config: web::Data<Config>,
) -> Result<HttpResponse, RequestError> {
    respond(&req, params.into_inner(), &service, &proxies, &quota, &config).await
}

async fn respond(
    req: &HttpRequest,
    params: QueryParams,
    service: &QueryService,
    proxies: &TrustedProxies,
    quota: &RequestQuota,
    config: &Config,
) -> Result<HttpResponse, RequestError> {
    // Missing input is rejected before any quota is spent.
    if params.ip.as_deref().map_or(true, |host| host.trim().is_empty()) {
        return Err(RequestError::MissingData);
    }

    let client_id = extract_client_id(req, &config.client_ip_header, proxies);

    // Untrusted clients share the empty id, so the flood quota falls back to the peer.
    let quota_key = if client_id.is_empty() {
        req.peer_addr().map(|addr| addr.ip().to_string()).unwrap_or_default()
    } else {
        client_id.clone()
    };
    if !quota.check(&quota_key) {
        warn!("Rate limit exceeded for query for {:?}", quota_key);
        return Err(RequestError::RateLimitExceeded);
    }

    debug!("Query for {:?}:{:?} from {:?}", params.ip, params.port, client_id);
    let status = service
        .resolve(params.ip.as_deref(), params.port.as_deref(), &client_id)
        .await?;

    Ok(HttpResponse::Ok().json(status))
}

#[derive(Debug, Serialize)]
struct TrackedServers {
    count: usize,
    servers: Vec<String>,
}

pub async fn tracked(service: web::Data<QueryService>) -> HttpResponse {
    match service.tracked() {
        Ok(servers) => HttpResponse::Ok().json(TrackedServers {
            count: servers.len(),
            servers,
        }),
        Err(e) => {
            error!("Failed to list tracked servers: {}", e);
            HttpResponse::InternalServerError().body("Failed to list tracked servers")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::index::index;
    use crate::models::status::{LookupStatus, ServerStatus, ThrottleResponse};
    use crate::query::protocol::mock::{MockProtocol, Outcome};
    use crate::storage::memory::MemoryStore;
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use std::sync::Arc;

    fn app_data(
        protocol: MockProtocol,
        config: Config,
    ) -> (Arc<MockProtocol>, web::Data<QueryService>, web::Data<Config>) {
        let protocol = Arc::new(protocol);
        let service = QueryService::new(Arc::new(MemoryStore::new()), protocol.clone(), &config);
        (protocol, web::Data::new(service), web::Data::new(config))
    }

    macro_rules! test_app {
        ($service:expr, $config:expr, $quota:expr) => {
            test::init_service(
                App::new()
                    .app_data($service.clone())
                    .app_data($config.clone())
                    .app_data(web::Data::new(TrustedProxies::new()))
                    .app_data(web::Data::new($quota))
                    .route("/", web::get().to(index))
                    .route("/query", web::get().to(query_get))
                    .route("/query", web::post().to(query_post))
                    .route("/tracked", web::get().to(tracked)),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn test_index() {
        let (_, service, config) = app_data(MockProtocol::online(20, 3), Config::default());
        let app = test_app!(service, config, RequestQuota::disabled());

        let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_query_defaults_port() {
        let (protocol, service, config) = app_data(MockProtocol::online(20, 3), Config::default());
        let app = test_app!(service, config, RequestQuota::disabled());

        let req = test::TestRequest::get().uri("/query?ip=mc.example.com").to_request();
        let status: ServerStatus = test::call_and_read_body_json(&app, req).await;

        assert_eq!(status.address, "mc.example.com:25565");
        assert!(status.online);
        assert_eq!(status.players.unwrap().max, 20);

        let req = test::TestRequest::get().uri("/query?ip=MC.example.com&port=25565").to_request();
        let cached: ServerStatus = test::call_and_read_body_json(&app, req).await;
        assert!(cached.online);
        assert_eq!(protocol.connects(), 1);
    }

    #[actix_web::test]
    async fn test_query_form_post() {
        let (_, service, config) = app_data(MockProtocol::online(8, 1), Config::default());
        let app = test_app!(service, config, RequestQuota::disabled());

        let req = test::TestRequest::post()
            .uri("/query")
            .set_form([("ip", "mc.example.com"), ("port", "25566")])
            .to_request();
        let status: ServerStatus = test::call_and_read_body_json(&app, req).await;

        assert_eq!(status.address, "mc.example.com:25566");
        assert_eq!(status.players.unwrap().max, 8);
    }

    #[actix_web::test]
    async fn test_query_missing_host() {
        let (protocol, service, config) = app_data(MockProtocol::online(20, 3), Config::default());
        let app = test_app!(service, config, RequestQuota::disabled());

        let req = test::TestRequest::get().uri("/query?port=25565").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let status: ServerStatus = test::read_body_json(resp).await;
        assert_eq!(status.status, LookupStatus::Error);
        assert_eq!(status.error, "missing data");
        assert_eq!(protocol.connects(), 0);
    }

    #[actix_web::test]
    async fn test_fatal_error_response() {
        let (protocol, service, config) = app_data(
            MockProtocol::new(Outcome::ConnectFails("lookup nope: no such host".to_string())),
            Config::default(),
        );
        let app = test_app!(service, config, RequestQuota::disabled());

        let req = test::TestRequest::get().uri("/query?ip=nope").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let status: ServerStatus = test::read_body_json(resp).await;
        assert_eq!(status.status, LookupStatus::Error);
        assert_eq!(status.error, "invalid hostname or port");
        assert!(!status.online);

        let req = test::TestRequest::get().uri("/query?ip=nope").to_request();
        test::call_service(&app, req).await;
        assert_eq!(protocol.connects(), 2);
    }

    #[actix_web::test]
    async fn test_client_throttled_after_failed_lookups() {
        let config = Config { throttle_threshold: 2, ..Config::default() };
        let (protocol, service, config) = app_data(
            MockProtocol::new(Outcome::ConnectFails("no such host".to_string())),
            config,
        );
        let app = test_app!(service, config, RequestQuota::disabled());

        for i in 0..3 {
            let req = test::TestRequest::get()
                .uri(&format!("/query?ip=bad{}.host", i))
                .insert_header(("CF-Connecting-IP", "198.51.100.7"))
                .to_request();
            test::call_service(&app, req).await;
        }

        let req = test::TestRequest::get()
            .uri("/query?ip=mc.example.com")
            .insert_header(("CF-Connecting-IP", "198.51.100.7"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);

        let body: ThrottleResponse = test::read_body_json(resp).await;
        assert_eq!(body, ThrottleResponse::new(1));
        assert_eq!(protocol.connects(), 3);
    }

    #[actix_web::test]
    async fn test_request_quota_rejects_flood() {
        let mut config = Config::default();
        config.query_burst_limit = 1;
        config.query_period_secs = 60;
        let quota = RequestQuota::new(config.query_quota());
        let (_, service, config) = app_data(MockProtocol::online(20, 3), config);
        let app = test_app!(service, config, quota);

        let req = || {
            test::TestRequest::get()
                .uri("/query?ip=mc.example.com")
                .insert_header(("CF-Connecting-IP", "198.51.100.7"))
                .to_request()
        };
        assert_eq!(test::call_service(&app, req()).await.status(), StatusCode::OK);
        assert_eq!(
            test::call_service(&app, req()).await.status(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[actix_web::test]
    async fn test_missing_host_does_not_spend_quota() {
        let mut config = Config::default();
        config.query_burst_limit = 1;
        config.query_period_secs = 60;
        let quota = RequestQuota::new(config.query_quota());
        let (protocol, service, config) = app_data(MockProtocol::online(20, 3), config);
        let app = test_app!(service, config, quota);

        for _ in 0..3 {
            let req = test::TestRequest::get()
                .uri("/query?port=25565")
                .insert_header(("CF-Connecting-IP", "198.51.100.7"))
                .to_request();
            assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
        }

        let req = test::TestRequest::get()
            .uri("/query?ip=mc.example.com")
            .insert_header(("CF-Connecting-IP", "198.51.100.7"))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
        assert_eq!(protocol.connects(), 1);
    }

    #[actix_web::test]
    async fn test_tracked_lists_probed_servers() {
        let (_, service, config) = app_data(MockProtocol::online(20, 3), Config::default());
        let app = test_app!(service, config, RequestQuota::disabled());

        let req = test::TestRequest::get().uri("/query?ip=mc.example.com").to_request();
        test::call_service(&app, req).await;

        let req = test::TestRequest::get().uri("/tracked").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["count"], 1);
        assert_eq!(body["servers"][0], "mc.example.com:25565");
    }
}
