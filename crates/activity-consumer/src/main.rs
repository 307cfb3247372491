use std::sync::Arc;
use std::time::Duration;

use activity_breaker::BreakerRegistry;
use activity_cache::CacheClient;
use activity_consumer::cli::Args;
use activity_consumer::dedup::Dedup;
use activity_consumer::pipeline::{Outcome, Pipeline};
use activity_enrichment::StrategyRegistry;
use activity_store_postgres::PostgresStore;
use activity_store_search::SearchIndex;
use anyhow::Context;
use clap::Parser;
use futures::StreamExt;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::{Message, OwnedMessage};
use rdkafka::producer::{FutureProducer, FutureRecord};

fn main() -> anyhow::Result<()> {
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting tracing default failed");

    let args = Args::parse();
    tracing::info!(?args, "starting activity-consumer");
    if args.kafka_enable_auto_commit {
        tracing::warn!(
            "KAFKA_ENABLE_AUTO_COMMIT=true is ignored; this consumer always commits offsets manually \
             so the dead-letter write can be acknowledged before its offset is committed"
        );
    }

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    runtime.block_on(async_main(args))
}

async fn async_main(args: Args) -> anyhow::Result<()> {
    let pool = sqlx::postgres::PgPoolOptions::new()
        .acquire_timeout(args.external_service_timeout)
        .connect(&args.database_url)
        .await
        .context("connecting to audit database")?;
    let postgres = PostgresStore::new(pool);
    postgres.migrate().await.context("running database migrations")?;

    let search = SearchIndex::new(args.elasticsearch_url.clone(), args.external_service_timeout);
    search.ensure_index().await.context("ensuring search index exists")?;

    let cache = CacheClient::connect(&args.redis_url, Duration::from_secs(300))
        .await
        .context("connecting to redis")?;

    let breakers = Arc::new(BreakerRegistry::new(
        args.circuit_breaker_enabled,
        args.circuit_breaker_failure_threshold,
        args.circuit_breaker_timeout,
    ));

    let pipeline = Arc::new(Pipeline {
        postgres,
        search,
        breakers: breakers.clone(),
        strategies: StrategyRegistry::new(),
        dedup: Dedup::new(cache, args.dedup_local_capacity),
        dedup_ttl: args.dedup_ttl,
        enable_audit_db: args.enable_audit_db,
    });

    let consumer: StreamConsumer = ClientConfig::new()
        .set("bootstrap.servers", &args.kafka_bootstrap_servers)
        .set("group.id", &args.kafka_consumer_group)
        .set("auto.offset.reset", &args.kafka_auto_offset_reset)
        .set("enable.auto.commit", "false")
        .create()
        .context("building kafka consumer")?;
    consumer
        .subscribe(&[&args.kafka_topic])
        .context("subscribing to transactions topic")?;

    let dlq_producer: FutureProducer = ClientConfig::new()
        .set("bootstrap.servers", &args.kafka_bootstrap_servers)
        .set("acks", "all")
        .set("retries", "3")
        .create()
        .context("building dead-letter producer")?;
    let dlq_topic = format!("{}.dlq", args.kafka_topic);

    tracing::info!(
        topic = args.kafka_topic,
        group = args.kafka_consumer_group,
        batch_size = args.batch_size,
        "consuming transaction events"
    );

    let mut stream = consumer.stream();
    let mut last_circuit_check = tokio::time::Instant::now();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        // Accumulates messages until `batch_size` is reached or
        // `batch_timeout` elapses, whichever comes first — the same
        // poll-then-drain shape the original system used, translated from a
        // blocking `poll(timeout_ms)` call into an async stream with a
        // deadline.
        let deadline = tokio::time::Instant::now() + args.batch_timeout;
        let mut batch: Vec<OwnedMessage> = Vec::with_capacity(args.batch_size);

        while batch.len() < args.batch_size {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                break;
            }
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    tracing::info!("received shutdown signal, stopping consumer");
                    return Ok(());
                }
                next = tokio::time::timeout(remaining, stream.next()) => match next {
                    Ok(Some(Ok(msg))) => batch.push(msg.detach()),
                    Ok(Some(Err(e))) => tracing::warn!(error = %e, "kafka poll error"),
                    Ok(None) => break,
                    Err(_) => break,
                },
            }
        }

        if last_circuit_check.elapsed() >= args.circuit_check_interval {
            check_and_reset_breaker(&pipeline.breakers, &pipeline.search).await;
            last_circuit_check = tokio::time::Instant::now();
        }

        if batch.is_empty() {
            continue;
        }

        process_batch(&consumer, &pipeline, &dlq_producer, &dlq_topic, batch).await;
    }
}

async fn process_batch(
    consumer: &StreamConsumer,
    pipeline: &Pipeline,
    dlq_producer: &FutureProducer,
    dlq_topic: &str,
    batch: Vec<OwnedMessage>,
) {
    tracing::info!(batch_size = batch.len(), "processing batch");
    let mut acked = 0usize;
    let mut rejected = 0usize;

    for message in &batch {
        let Some(payload) = message.payload() else {
            tracing::warn!("message had no payload, acking to avoid reprocessing");
            if let Err(e) = consumer.commit_message(message, CommitMode::Async) {
                tracing::warn!(error = %e, "failed to commit offset");
            }
            acked += 1;
            continue;
        };

        match pipeline.process(payload).await {
            Outcome::Ack => {
                if let Err(e) = consumer.commit_message(message, CommitMode::Async) {
                    tracing::warn!(error = %e, "failed to commit offset");
                }
                acked += 1;
            }
            Outcome::Reject { reason } => {
                rejected += 1;
                // Only commit the offset once the DLQ write itself is
                // acknowledged — a failed dead-letter send leaves the
                // message uncommitted so the next poll redelivers it rather
                // than silently dropping a failure nobody recorded.
                if send_to_dlq(dlq_producer, dlq_topic, payload, &reason).await {
                    if let Err(e) = consumer.commit_message(message, CommitMode::Async) {
                        tracing::warn!(error = %e, "failed to commit offset after dead-letter write");
                    }
                }
            }
        }
    }

    tracing::info!(total = batch.len(), acked, rejected, "batch processed");
}

/// Forwards a failed message to the dead-letter topic in the wire format
/// `{original_message, error, timestamp}`. `original_message` carries the
/// parsed JSON payload when the message was valid JSON, or the raw bytes as
/// a string otherwise, so the DLQ record is self-contained without needing
/// a base64 decode step downstream. Returns whether the send was
/// acknowledged.
async fn send_to_dlq(dlq_producer: &FutureProducer, dlq_topic: &str, payload: &[u8], reason: &str) -> bool {
    let original_message: serde_json::Value = serde_json::from_slice(payload)
        .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(payload).into_owned()));

    let envelope = serde_json::json!({
        "original_message": original_message,
        "error": reason,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    let body = serde_json::to_vec(&envelope).expect("dlq envelope always serializes");
    let record = FutureRecord::to(dlq_topic).key(reason).payload(&body);
    match dlq_producer.send(record, Duration::from_secs(5)).await {
        Ok(_) => {
            tracing::warn!(dlq_topic, reason, "message sent to dead-letter topic");
            true
        }
        Err((e, _)) => {
            tracing::error!(error = %e, "failed to send message to dead-letter topic");
            false
        }
    }
}

async fn check_and_reset_breaker(breakers: &BreakerRegistry, search: &SearchIndex) {
    let breaker = breakers.get("search");
    if !breaker.is_open() {
        return;
    }
    if search.health().await {
        breaker.reset();
        tracing::info!("search index reachable again, circuit breaker reset");
    }
}
