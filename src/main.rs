use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use mail_responder::channels::{
    HttpAttachmentFetcher, MailDispatcher, MailgunDispatcher, SmtpDispatcher, webhook_routes,
};
use mail_responder::config::{DispatchConfig, ResponderConfig};
use mail_responder::llm::create_provider;
use mail_responder::pipeline::EmailReplyPipeline;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let config = ResponderConfig::from_env().context("invalid configuration")?;

    // Stderr always; a daily rolling file when RESPONDER_LOG_DIR is set.
    let (file_layer, _log_guard) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "mail-responder.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .init();

    eprintln!("📬 Mail Responder v{}", env!("CARGO_PKG_VERSION"));
    eprintln!(
        "   Model: {} (max {} tokens)",
        config.llm.model, config.pipeline.max_tokens
    );
    eprintln!("   From: {}", config.from_address);
    eprintln!("   Timeout: {}s", config.http_timeout.as_secs());

    let llm = create_provider(&config.llm).context("failed to create completion provider")?;
    let fetcher = Arc::new(
        HttpAttachmentFetcher::new(config.http_timeout)
            .context("failed to build attachment client")?,
    );

    let dispatcher: Arc<dyn MailDispatcher> = match &config.dispatch {
        DispatchConfig::Mailgun(mailgun) => {
            eprintln!("   Dispatch: Mailgun ({})", mailgun.domain);
            Arc::new(
                MailgunDispatcher::new(mailgun, &config.from_address)
                    .context("failed to create Mailgun dispatcher")?,
            )
        }
        DispatchConfig::Smtp(smtp) => {
            eprintln!("   Dispatch: SMTP ({}:{})", smtp.host, smtp.port);
            Arc::new(
                SmtpDispatcher::new(smtp, &config.from_address)
                    .context("failed to create SMTP dispatcher")?,
            )
        }
    };

    match &config.pipeline.allowed_senders {
        Some(senders) => eprintln!("   Allowed senders: {senders}"),
        None => eprintln!("   Allowed senders: everyone"),
    }

    let pipeline = Arc::new(EmailReplyPipeline::new(
        llm,
        fetcher,
        dispatcher,
        config.pipeline.clone(),
    ));
    let app = webhook_routes(pipeline);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("failed to bind port {}", config.port))?;
    eprintln!("   Webhook: http://0.0.0.0:{}/webhook\n", config.port);
    tracing::info!(port = config.port, "Webhook server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutting down");
        })
        .await
        .context("server error")?;

    Ok(())
}
