//! A single producer queue for sending playback changes to the render thread.
use std::sync::mpsc::{Receiver, SendError, Sender, TryRecvError, channel};

use crate::instance::InstanceId;

/// A change to instance playback applied in submission order.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum UpdateCommand {
    /// Advance all playing instances.
    Tick { delta_seconds: f32 },
    /// Restart an instance at the first frame of a clip.
    PlayClip {
        instance: InstanceId,
        clip_index: usize,
    },
    SetPlaying { instance: InstanceId, playing: bool },
}

/// Create a connected sender and receiver for [UpdateCommand].
pub fn update_channel() -> (UpdateSender, UpdateReceiver) {
    let (sender, receiver) = channel();
    (UpdateSender { sender }, UpdateReceiver { receiver })
}

/// The producer side of the update queue.
///
/// Commands have a single producer, so this does not implement [Clone].
#[derive(Debug)]
pub struct UpdateSender {
    sender: Sender<UpdateCommand>,
}

impl UpdateSender {
    pub fn send(&self, command: UpdateCommand) -> Result<(), SendError<UpdateCommand>> {
        self.sender.send(command)
    }

    pub fn tick(&self, delta_seconds: f32) -> Result<(), SendError<UpdateCommand>> {
        self.send(UpdateCommand::Tick { delta_seconds })
    }

    pub fn play_clip(
        &self,
        instance: InstanceId,
        clip_index: usize,
    ) -> Result<(), SendError<UpdateCommand>> {
        self.send(UpdateCommand::PlayClip {
            instance,
            clip_index,
        })
    }

    pub fn set_playing(
        &self,
        instance: InstanceId,
        playing: bool,
    ) -> Result<(), SendError<UpdateCommand>> {
        self.send(UpdateCommand::SetPlaying { instance, playing })
    }
}

/// The consumer side of the update queue.
#[derive(Debug)]
pub struct UpdateReceiver {
    receiver: Receiver<UpdateCommand>,
}

/// The result of [UpdateReceiver::drain].
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct Drained {
    /// The number of commands processed.
    pub count: usize,
    /// `true` if the sender was dropped and no more commands will arrive.
    pub disconnected: bool,
}

impl UpdateReceiver {
    /// Process all pending commands without blocking.
    pub fn drain<F: FnMut(UpdateCommand)>(&self, mut f: F) -> Drained {
        let mut drained = Drained::default();
        loop {
            match self.receiver.try_recv() {
                Ok(command) => {
                    f(command);
                    drained.count += 1;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    drained.disconnected = true;
                    break;
                }
            }
        }
        drained
    }
}
