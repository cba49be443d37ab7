//! 流复制器：一个源，N 个独立子流
//!
//! 泵每次读一块，把同一块（`Arc` 共享）依次送进每个子流的有界队列，
//! 全部送达后才读下一块，所以最慢的消费者决定节奏。
//!
//! 约定：每个子流必须被持续读取，或者直接丢弃。丢弃的子流会从扇出中摘除，
//! 不会拖住其它子流；但一个既不读也不丢的子流会让泵一直等到会话取消。
use std::io::{self, Read};
use std::sync::Arc;

use crossbeam_channel::{select, Receiver, Sender};
use tracing::debug;

use crate::cancel::CancelToken;
use crate::error::Canceled;

/// 子流中的一块数据（所有子流共享同一份）
pub type Chunk = Arc<[u8]>;

/// 泵的结束原因
#[derive(Debug)]
pub enum PumpEnd {
    /// 源读到 EOF
    Eof,
    /// 所有子流都已被丢弃，无需再读
    ConsumersGone,
    /// 会话取消
    Canceled,
    /// 读源失败；已读部分照常送达
    ReadFailed(io::Error),
}

#[derive(Debug)]
pub struct PumpReport {
    pub bytes_read: u64,
    pub end: PumpEnd,
}

/// 泵：独占源，运行在自己的线程里
pub struct Pump<R> {
    source: R,
    sinks: Vec<Option<Sender<Chunk>>>,
    chunk_size: usize,
    cancel: CancelToken,
}

/// 可独立读取的子流
#[derive(Debug)]
pub struct SubStream {
    rx: Receiver<Chunk>,
    cancel: CancelToken,
    /// `Read` 实现里尚未读完的块及其已读位置
    pending: Option<(Chunk, usize)>,
}

/// 把 `source` 拆成 `n` 个子流；返回的泵需要在单独线程里 `run`
pub fn fan_out<R: Read>(
    source: R,
    n: usize,
    chunk_size: usize,
    queue_depth: usize,
    cancel: &CancelToken,
) -> (Pump<R>, Vec<SubStream>) {
    let mut sinks = Vec::with_capacity(n);
    let mut streams = Vec::with_capacity(n);
    for _ in 0..n {
        let (tx, rx) = crossbeam_channel::bounded(queue_depth);
        sinks.push(Some(tx));
        streams.push(SubStream {
            rx,
            cancel: cancel.clone(),
            pending: None,
        });
    }
    let pump = Pump {
        source,
        sinks,
        chunk_size: chunk_size.max(1),
        cancel: cancel.clone(),
    };
    (pump, streams)
}

impl<R: Read> Pump<R> {
    pub fn run(mut self) -> PumpReport {
        let mut buf = vec![0u8; self.chunk_size];
        let mut bytes_read: u64 = 0;

        let end = 'pump: loop {
            if self.cancel.is_cancelled() {
                break PumpEnd::Canceled;
            }
            if self.sinks.iter().all(Option::is_none) {
                break PumpEnd::ConsumersGone;
            }
            let n = match self.source.read(&mut buf) {
                Ok(0) => break PumpEnd::Eof,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => break PumpEnd::ReadFailed(e),
            };
            bytes_read += n as u64;
            let chunk: Chunk = Arc::from(&buf[..n]);

            // 同一块送达所有子流后才读下一块
            for slot in self.sinks.iter_mut() {
                let Some(tx) = slot.as_ref() else { continue };
                let detached = select! {
                    send(tx, Arc::clone(&chunk)) -> res => res.is_err(),
                    recv(self.cancel.cancelled()) -> _ => break 'pump PumpEnd::Canceled,
                };
                if detached {
                    *slot = None;
                }
            }
        };

        // 丢弃全部发送端 = 通知每个子流 EOF
        self.sinks.clear();
        debug!(bytes_read, end = ?end, "pump finished");
        PumpReport { bytes_read, end }
    }
}

impl SubStream {
    /// 取下一块；`Ok(None)` 表示流结束
    pub fn next_chunk(&mut self) -> Result<Option<Chunk>, Canceled> {
        if let Some((chunk, pos)) = self.pending.take() {
            return Ok(Some(Arc::from(&chunk[pos..])));
        }
        if self.cancel.is_cancelled() {
            return Err(Canceled);
        }
        select! {
            recv(self.rx) -> msg => Ok(msg.ok()),
            recv(self.cancel.cancelled()) -> _ => Err(Canceled),
        }
    }
}

impl Read for SubStream {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        let (chunk, pos) = match self.pending.take() {
            Some(p) => p,
            None => match self.next_chunk() {
                Ok(Some(c)) => (c, 0),
                Ok(None) => return Ok(0),
                Err(e) => return Err(io::Error::new(io::ErrorKind::Other, e)),
            },
        };
        let n = out.len().min(chunk.len() - pos);
        out[..n].copy_from_slice(&chunk[pos..pos + n]);
        if pos + n < chunk.len() {
            self.pending = Some((chunk, pos + n));
        }
        Ok(n)
    }
}
