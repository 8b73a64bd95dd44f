use rapid_http::config::Limits;
use rapid_http::connection::{MessageReader, MessageWriter};
use rapid_http::pool::BufferPool;
use rapid_http::protocol::{HttpError, Request, Response, SendError};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    info!(port = 8080, "start listening");
    let tcp_listener = match TcpListener::bind("127.0.0.1:8080").await {
        Ok(tcp_listener) => tcp_listener,
        Err(e) => {
            error!(cause = %e, "bind server error");
            return;
        }
    };

    let limits = Limits::default().with_max_body_size(4 * 1024 * 1024);
    let pool = BufferPool::new(1024);
    loop {
        let (tcp_stream, _remote_addr) = match tcp_listener.accept().await {
            Ok(stream_and_addr) => stream_and_addr,
            Err(e) => {
                warn!(cause = %e, "failed to accept");
                continue;
            }
        };

        let pool = pool.clone();
        tokio::spawn(async move {
            let (reader, writer) = tcp_stream.into_split();
            let mut reader = MessageReader::with_pool(reader, limits, &pool);
            let mut writer = MessageWriter::with_pool(writer, limits, &pool);
            match serve(&mut reader, &mut writer, &pool).await {
                Ok(()) => info!("finished process, connection shutdown"),
                Err(e) => error!(cause = %e, "service has error, connection shutdown"),
            }
        });
    }
}

/// Answers every request on the connection with its own body.
async fn serve(
    reader: &mut MessageReader<OwnedReadHalf>,
    writer: &mut MessageWriter<OwnedWriteHalf>,
    pool: &BufferPool,
) -> Result<(), HttpError> {
    let mut request = Request::with_pool(pool);
    let mut response = Response::with_pool(pool);
    loop {
        match request.read(reader).await {
            Ok(()) => {}
            Err(e) if e.is_end_of_stream() => return Ok(()),
            Err(e) => return Err(e.into()),
        }

        if request.may_continue() {
            writer.get_mut().write_all(b"HTTP/1.1 100 Continue\r\n\r\n").await.map_err(SendError::io)?;
            request.continue_read_body(reader).await?;
        }

        info!(path = %String::from_utf8_lossy(request.uri().path()), "request");
        response.reset();
        response.set_skip_body(request.header().is_head());
        response.header_mut().set_content_type(b"application/octet-stream");
        response.set_body(request.body_bytes());
        if request.connection_close() {
            response.set_connection_close();
        }
        response.write_to(writer).await?;

        if response.connection_close() {
            return Ok(());
        }
    }
}
