//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Handler trait for token stream events

use crate::{StreamError, TokenStream};
use amilink_tokencodec::Frame;

/// Consumer of frames and alarms produced by a [`TokenStream`].
///
/// The stream hands itself back to every callback so the handler can write
/// replies, reschedule the alarm or abort without owning the stream. Calls
/// happen only from inside [`TokenStream::tick`] and [`TokenStream::abort`].
///
/// Returning an error from a callback aborts the stream; the error is then
/// returned from the `tick` that triggered it.
pub trait StreamHandler<A> {
    /// Error type surfaced by `tick`, able to carry stream failures
    type Error: From<StreamError>;

    /// Called for every complete frame, in arrival order
    ///
    /// When the stream aborts, one final frame without its delimiter may be
    /// delivered; check [`Frame::is_terminated`].
    fn on_frame(&mut self, stream: &mut TokenStream<A>, frame: Frame) -> Result<(), Self::Error>;

    /// Called when the pending alarm expires
    fn on_alarm(&mut self, _stream: &mut TokenStream<A>, _alarm: A) -> Result<(), Self::Error> {
        Ok(())
    }
}
