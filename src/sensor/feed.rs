use crate::error::{Error, Result, SensorFault};
use crate::models::fix::DeviceFix;
use crate::models::LocationSample;
use crate::sensor::{PositionSource, SamplerOptions, SensorEvent, WatchId};
use chrono::Utc;
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Position source reading one JSON fix per line, e.g. from a GPS bridge FIFO.
///
/// The reader can be watched once; a second watch reports the sensor unavailable.
pub struct LineFeedSource<R> {
    reader: Mutex<Option<R>>,
    tasks: Mutex<HashMap<u64, JoinHandle<()>>>,
    next_id: AtomicU64,
}

impl<R> LineFeedSource<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    pub fn new(reader: R) -> Self {
        Self {
            reader: Mutex::new(Some(reader)),
            tasks: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl<R> PositionSource for LineFeedSource<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    fn watch(&self, options: SamplerOptions, sink: mpsc::Sender<SensorEvent>) -> Result<WatchId> {
        let reader = self
            .reader
            .lock()
            .map_err(|_| Error::SensorUnavailable)?
            .take()
            .ok_or(Error::SensorUnavailable)?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let task = tokio::spawn(pump(reader, options, sink));
        if let Ok(mut tasks) = self.tasks.lock() {
            tasks.insert(id, task);
        }
        Ok(WatchId(id))
    }

    fn clear_watch(&self, id: WatchId) {
        let task = self.tasks.lock().ok().and_then(|mut tasks| tasks.remove(&id.0));
        if let Some(task) = task {
            task.abort();
        }
    }
}

impl<R> Drop for LineFeedSource<R> {
    fn drop(&mut self) {
        if let Ok(tasks) = self.tasks.get_mut() {
            for (_, task) in tasks.drain() {
                task.abort();
            }
        }
    }
}

async fn pump<R>(reader: R, options: SamplerOptions, sink: mpsc::Sender<SensorEvent>)
where
    R: AsyncBufRead + Unpin,
{
    debug!(high_accuracy = options.high_accuracy, "reading position feed");
    let mut lines = reader.lines();
    let mut cached: Option<(LocationSample, Instant)> = None;

    loop {
        let event = match tokio::time::timeout(options.timeout, lines.next_line()).await {
            Ok(Ok(Some(line))) => {
                if line.trim().is_empty() {
                    continue;
                }
                match DeviceFix::parse(&line).and_then(|fix| fix.into_sample(Utc::now())) {
                    Ok(sample) => {
                        cached = Some((sample.clone(), Instant::now()));
                        SensorEvent::Fix(sample)
                    }
                    Err(fault) => SensorEvent::Fault(fault),
                }
            }
            Ok(Ok(None)) => {
                debug!("position feed ended");
                break;
            }
            // The undecodable line has already been consumed.
            Ok(Err(e)) if e.kind() == io::ErrorKind::InvalidData => {
                warn!("Skipping undecodable feed line: {}", e);
                SensorEvent::Fault(SensorFault::PositionUnavailable(e.to_string()))
            }
            Ok(Err(e)) => {
                warn!("Position feed read error: {}", e);
                let _ = sink
                    .send(SensorEvent::Fault(SensorFault::PositionUnavailable(e.to_string())))
                    .await;
                break;
            }
            Err(_) => match &cached {
                Some((sample, at)) if at.elapsed() <= options.maximum_age => {
                    SensorEvent::Fix(sample.clone())
                }
                _ => SensorEvent::Fault(SensorFault::Timeout),
            },
        };

        if sink.send(event).await.is_err() {
            break;
        }
    }
}
