//! Container element: strips fixed-format leading metadata (ID3v2) from
//! the head of a new `EncodedStream` (spec.md §4.3). Grounded on
//! `Media/Codec/Id3v2.cpp`'s recognise-then-strip state machine, which it
//! matches: a probe of the first 10 bytes decides whether a header is
//! present, after which that many bytes are dropped from the stream
//! before anything reaches the codec controller.

use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;

use crate::message::{Message, Pool, PooledMessage};
use crate::pipeline::Pullable;

const PROBE_BYTES: usize = 10;

enum State {
    AwaitingHeader { buffered: BytesMut },
    Stripping { remaining: u64 },
    PassThrough,
}

/// Returns the total ID3v2 header length (including the 10-byte header
/// itself, plus a footer if flagged) if `probe` begins with a
/// recognisable ID3v2 tag.
fn recognise_id3v2(probe: &[u8]) -> Option<u64> {
    if probe.len() < PROBE_BYTES || &probe[0..3] != b"ID3" {
        return None;
    }
    if probe[3] > 4 {
        return None;
    }
    let has_footer = probe[5] & 0x10 != 0;
    if probe[6..10].iter().any(|b| b & 0x80 != 0) {
        return None;
    }
    let size = ((probe[6] as u64) << 21)
        | ((probe[7] as u64) << 14)
        | ((probe[8] as u64) << 7)
        | (probe[9] as u64);
    Some(size + 10 + if has_footer { 10 } else { 0 })
}

/// Pull-through element that strips an ID3v2 header, if present, from
/// the start of every new encoded stream.
pub struct Container<U> {
    upstream: U,
    pool: Pool<Message>,
    state: Mutex<State>,
}

impl<U: Pullable> Container<U> {
    #[must_use]
    pub fn new(upstream: U, pool: Pool<Message>) -> Self {
        Self {
            upstream,
            pool,
            state: Mutex::new(State::AwaitingHeader {
                buffered: BytesMut::new(),
            }),
        }
    }

    fn emit(&self, bytes: Bytes) -> PooledMessage {
        self.pool.alloc_shared(Message::EncodedAudio(bytes))
    }
}

impl<U: Pullable> Pullable for Container<U> {
    fn pull(&self) -> PooledMessage {
        loop {
            let msg = self.upstream.pull();
            match &*msg {
                Message::EncodedStream(_) => {
                    *self.state.lock() = State::AwaitingHeader {
                        buffered: BytesMut::new(),
                    };
                    return msg;
                }
                Message::EncodedAudio(data) => {
                    let data = data.clone();
                    let mut state = self.state.lock();
                    match &mut *state {
                        State::PassThrough => {
                            drop(state);
                            return msg;
                        }
                        State::Stripping { remaining } => {
                            let drop_n = (*remaining).min(data.len() as u64) as usize;
                            *remaining -= drop_n as u64;
                            let keep = data.slice(drop_n..);
                            let done = *remaining == 0;
                            drop(state);
                            if done {
                                *self.state.lock() = State::PassThrough;
                            }
                            if keep.is_empty() {
                                continue;
                            }
                            return self.emit(keep);
                        }
                        State::AwaitingHeader { buffered } => {
                            buffered.extend_from_slice(&data);
                            if buffered.len() < PROBE_BYTES {
                                continue;
                            }
                            let accumulated = buffered.clone();
                            match recognise_id3v2(&accumulated) {
                                Some(header_len) if header_len > accumulated.len() as u64 => {
                                    *state = State::Stripping {
                                        remaining: header_len - accumulated.len() as u64,
                                    };
                                    continue;
                                }
                                Some(header_len) => {
                                    let keep = accumulated.freeze().slice(header_len as usize..);
                                    *state = State::PassThrough;
                                    drop(state);
                                    if keep.is_empty() {
                                        continue;
                                    }
                                    return self.emit(keep);
                                }
                                None => {
                                    *state = State::PassThrough;
                                    drop(state);
                                    return self.emit(accumulated.freeze());
                                }
                            }
                        }
                    }
                }
                _ => return msg,
            }
        }
    }
}
