//! Live server tests over a real socket.

use std::time::Duration;

use switchyard::config::ModeSetting;
use switchyard::http::{HandlerRef, Reply};
use switchyard::lifecycle::Shutdown;
use switchyard::routing::Routes;
use switchyard::HttpServer;
use tokio::net::TcpListener;

mod common;

#[tokio::test]
async fn test_serve_and_graceful_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let mut routes = Routes::new();
    routes
        .get("/profile/{username?}", HandlerRef::func(|ctx| {
            Ok(Reply::text(match ctx.param("username") {
                Some(name) => format!("Profile: {}", name),
                None => "My profile".to_string(),
            }))
        }))
        .unwrap();

    // Auto mode: loopback clients get development error pages.
    let config = common::test_config(dir.path(), ModeSetting::Auto);
    let server = HttpServer::new(config, routes.build());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let handle = tokio::spawn(async move { server.run(listener, server_shutdown).await });

    let client = reqwest::Client::builder().no_proxy().build().unwrap();

    let res = client.get(format!("http://{}/profile/ada", addr)).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "Profile: ada");

    let res = client.get(format!("http://{}/profile", addr)).send().await.unwrap();
    assert_eq!(res.text().await.unwrap(), "My profile");

    let res = client.get(format!("http://{}/missing", addr)).send().await.unwrap();
    assert_eq!(res.status(), 404);
    assert!(res.text().await.unwrap().contains("404"));

    drop(client);
    shutdown.trigger();
    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("server did not stop")
        .unwrap();
    assert!(result.is_ok());
}
