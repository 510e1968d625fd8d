use std::net::SocketAddr;
use std::time::Duration;

use axum::http::{HeaderMap, StatusCode};
use futures::TryStreamExt;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
};

use streamrelay::server::services::upstream_services::{UpstreamService, UpstreamServiceTrait};

// answers one request with `chunks` pieces of `chunk_len` bytes, sleeping `gap` before each
async fn trickle_server(chunks: usize, chunk_len: usize, gap: Duration) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();

        let mut request = vec![0u8; 4096];
        let _ = socket.read(&mut request).await.unwrap();

        let head = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: video/mp2t\r\nContent-Length: {}\r\n\r\n",
            chunks * chunk_len
        );
        socket.write_all(head.as_bytes()).await.unwrap();
        socket.flush().await.unwrap();

        for _ in 0..chunks {
            tokio::time::sleep(gap).await;
            if socket.write_all(&vec![b'x'; chunk_len]).await.is_err() {
                return;
            }
            let _ = socket.flush().await;
        }
    });

    addr
}

#[tokio::test]
async fn test_slow_steady_body_is_not_cut_off() {
    // 900ms in total, never idle for the full 500ms
    let addr = trickle_server(3, 10, Duration::from_millis(300)).await;
    let upstream = UpstreamService::new(Duration::from_millis(500));

    let response = upstream
        .fetch(&format!("http://{}/seg.ts", addr), &HeaderMap::new())
        .await
        .unwrap();
    assert_eq!(response.status, StatusCode::OK);

    let chunks: Vec<bytes::Bytes> = response.body.try_collect().await.unwrap();
    let total: usize = chunks.iter().map(|chunk| chunk.len()).sum();
    assert_eq!(total, 30);
}

#[tokio::test]
async fn test_stalled_body_times_out() {
    let addr = trickle_server(2, 10, Duration::from_secs(3)).await;
    let upstream = UpstreamService::new(Duration::from_millis(300));

    let response = upstream
        .fetch(&format!("http://{}/seg.ts", addr), &HeaderMap::new())
        .await
        .unwrap();

    let result: Result<Vec<bytes::Bytes>, _> = response.body.try_collect().await;
    assert!(result.is_err());
}
