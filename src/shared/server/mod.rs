//! HTTPサーバー
//!
//! 接続ごとにタスクを生成し、CORSヘッダーの付与とリクエストログ、処理タイムアウトを扱う。
//! ルーティングは呼び出し側のハンドラーに任せる。
pub mod response;

use crate::shared::config::ServerConfig;
use crate::shared::errors::{AppError, AppResult};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::{Bytes, Incoming};
use hyper::header::{
    HeaderMap, HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_MAX_AGE,
};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::{TokioIo, TokioTimer};
use std::convert::Infallible;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};

pub use response::{empty_response, error_response, json_response, not_found_response, status_for};

/// ハンドラーに渡すリクエスト
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub body: Bytes,
}

/// 設定されたアドレスでリスナーを作成する
pub async fn bind(config: &ServerConfig) -> AppResult<TcpListener> {
    let address = config.address();
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|e| AppError::configuration(format!("{address} へのバインドに失敗: {e}")))?;

    log::info!("HTTPサーバーを開始しました: http://{}", listener.local_addr()?);

    Ok(listener)
}

/// 停止シグナルを受け取るまで接続を受け付ける
///
/// # 引数
/// * `listener` - 待ち受け中のリスナー
/// * `config` - タイムアウト設定
/// * `handler` - リクエストを処理する関数
/// * `shutdown` - 完了すると受け付けを停止するFuture
///
/// # 戻り値
/// 停止時はOk(())
pub async fn serve<H, F, S>(
    listener: TcpListener,
    config: &ServerConfig,
    handler: H,
    shutdown: S,
) -> AppResult<()>
where
    H: Fn(ApiRequest) -> F + Clone + Send + Sync + 'static,
    F: Future<Output = Response<String>> + Send + 'static,
    S: Future<Output = ()>,
{
    let read_timeout = Duration::from_secs(config.read_timeout_secs);
    let request_timeout = Duration::from_secs(config.request_timeout_secs);
    let max_body_bytes = config.max_body_bytes;

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, remote)) => {
                    log::debug!("接続を受け付けました: {remote}");
                    let handler = handler.clone();
                    tokio::spawn(async move {
                        handle_connection(stream, handler, read_timeout, request_timeout, max_body_bytes)
                            .await;
                    });
                }
                Err(e) => {
                    log::warn!("接続受け入れエラー: {e}");
                }
            },
            _ = &mut shutdown => {
                log::info!("停止シグナルを受信しました。新規接続の受け付けを終了します");
                break;
            }
        }
    }

    Ok(())
}

/// TCP接続を処理する
async fn handle_connection<H, F>(
    stream: TcpStream,
    handler: H,
    read_timeout: Duration,
    request_timeout: Duration,
    max_body_bytes: usize,
) where
    H: Fn(ApiRequest) -> F + Clone + Send + Sync + 'static,
    F: Future<Output = Response<String>> + Send + 'static,
{
    let io = TokioIo::new(stream);

    let service = service_fn(move |req| {
        let handler = handler.clone();
        async move {
            Ok::<_, Infallible>(handle_request(req, handler, request_timeout, max_body_bytes).await)
        }
    });

    let mut builder = http1::Builder::new();
    builder
        .timer(TokioTimer::new())
        .header_read_timeout(read_timeout);

    if let Err(err) = builder.serve_connection(io, service).await {
        log::error!("HTTP接続処理エラー: {err}");
    }
}

/// HTTPリクエストを処理する
async fn handle_request<H, F>(
    req: Request<Incoming>,
    handler: H,
    request_timeout: Duration,
    max_body_bytes: usize,
) -> Response<String>
where
    H: Fn(ApiRequest) -> F,
    F: Future<Output = Response<String>>,
{
    let started = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().map(str::to_string);

    let mut response = if method == Method::OPTIONS {
        empty_response(StatusCode::NO_CONTENT)
    } else {
        match Limited::new(req.into_body(), max_body_bytes).collect().await {
            Ok(collected) => {
                let request = ApiRequest {
                    method: method.clone(),
                    path: path.clone(),
                    query,
                    body: collected.to_bytes(),
                };
                match tokio::time::timeout(request_timeout, handler(request)).await {
                    Ok(response) => response,
                    Err(_) => error_response(&AppError::Timeout(format!(
                        "{}秒以内に処理が完了しませんでした",
                        request_timeout.as_secs()
                    ))),
                }
            }
            Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
                log::warn!("リクエスト本文が上限を超えました: 上限={max_body_bytes}バイト");
                error_response(&AppError::PayloadTooLarge(max_body_bytes))
            }
            Err(e) => {
                log::warn!("リクエスト本文の読み込みに失敗: {e}");
                error_response(&AppError::validation("リクエスト本文を読み込めませんでした"))
            }
        }
    };

    apply_cors_headers(response.headers_mut());

    log::info!(
        "{} {} {} {}ms",
        method,
        path,
        response.status().as_u16(),
        started.elapsed().as_millis()
    );

    response
}

/// CORSヘッダーを付与する
fn apply_cors_headers(headers: &mut HeaderMap) {
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS"),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization"),
    );
    headers.insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("86400"));
}
