//! Multi-channel planar audio buffers.
//!
//! [`AudioBuffer`] is both the result type of offline rendering and the block
//! type the engine passes between nodes within a render quantum.

#[cfg(not(feature = "std"))]
use alloc::{format, vec, vec::Vec};

use crate::error::{AudioError, Result};

/// Planar multi-channel audio with a sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    channels: Vec<Vec<f32>>,
    sample_rate: f32,
}

impl AudioBuffer {
    /// Creates a zeroed buffer.
    pub fn new(number_of_channels: usize, length: usize, sample_rate: f32) -> Self {
        Self {
            channels: vec![vec![0.0; length]; number_of_channels],
            sample_rate,
        }
    }

    /// Wraps existing channel data.
    ///
    /// # Errors
    ///
    /// [`AudioError::IndexSize`] if the channels differ in length.
    pub fn from_channels(channels: Vec<Vec<f32>>, sample_rate: f32) -> Result<Self> {
        if let Some(first) = channels.first()
            && channels.iter().any(|c| c.len() != first.len())
        {
            return Err(AudioError::index_size("channels must all have the same length"));
        }
        Ok(Self {
            channels,
            sample_rate,
        })
    }

    /// Number of channels.
    pub fn number_of_channels(&self) -> usize {
        self.channels.len()
    }

    /// Length in sample frames.
    pub fn length(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        self.length() as f64 / f64::from(self.sample_rate)
    }

    /// Borrows one channel.
    ///
    /// # Errors
    ///
    /// [`AudioError::IndexSize`] if `channel` is out of range.
    pub fn get_channel_data(&self, channel: usize) -> Result<&[f32]> {
        self.channels
            .get(channel)
            .map(Vec::as_slice)
            .ok_or_else(|| channel_error(channel, self.channels.len()))
    }

    /// Mutably borrows one channel.
    ///
    /// # Errors
    ///
    /// [`AudioError::IndexSize`] if `channel` is out of range.
    pub fn get_channel_data_mut(&mut self, channel: usize) -> Result<&mut [f32]> {
        let count = self.channels.len();
        self.channels
            .get_mut(channel)
            .map(Vec::as_mut_slice)
            .ok_or_else(|| channel_error(channel, count))
    }

    /// All channels.
    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    /// All channels, mutably.
    pub fn channels_mut(&mut self) -> &mut [Vec<f32>] {
        &mut self.channels
    }

    /// Consumes the buffer, returning its channels.
    pub fn into_channels(self) -> Vec<Vec<f32>> {
        self.channels
    }

    /// Copies samples of `channel`, starting at frame `start`, into `destination`.
    ///
    /// Copies as many frames as fit in both.
    ///
    /// # Errors
    ///
    /// [`AudioError::IndexSize`] if `channel` is out of range.
    pub fn copy_from_channel(
        &self,
        destination: &mut [f32],
        channel: usize,
        start: usize,
    ) -> Result<()> {
        let source = self.get_channel_data(channel)?;
        let source = source.get(start..).unwrap_or(&[]);
        let n = source.len().min(destination.len());
        destination[..n].copy_from_slice(&source[..n]);
        Ok(())
    }

    /// Copies `source` into `channel`, starting at frame `start`.
    ///
    /// # Errors
    ///
    /// [`AudioError::IndexSize`] if `channel` is out of range.
    pub fn copy_to_channel(&mut self, source: &[f32], channel: usize, start: usize) -> Result<()> {
        let destination = self.get_channel_data_mut(channel)?;
        let destination = destination.get_mut(start..).unwrap_or(&mut []);
        let n = source.len().min(destination.len());
        destination[..n].copy_from_slice(&source[..n]);
        Ok(())
    }

    /// Fills every channel with zeros.
    pub fn clear(&mut self) {
        for channel in &mut self.channels {
            channel.fill(0.0);
        }
    }

    /// Shortens every channel to `length` frames.
    pub fn truncate(&mut self, length: usize) {
        for channel in &mut self.channels {
            channel.truncate(length);
        }
    }

    /// Changes the channel count, adding silent channels or dropping trailing ones.
    pub fn set_number_of_channels(&mut self, number_of_channels: usize) {
        let length = self.length();
        self.channels.resize_with(number_of_channels, || vec![0.0; length]);
    }

    /// Appends the frames of `other` (which must have the same channel count).
    pub fn append(&mut self, other: &AudioBuffer) {
        for (dst, src) in self.channels.iter_mut().zip(&other.channels) {
            dst.extend_from_slice(src);
        }
    }

    /// Adds `other` into this buffer with speaker up/down-mixing.
    ///
    /// Equal channel counts sum channel by channel. A mono source is copied
    /// to every destination channel. A mono destination receives the average
    /// of the source channels. Any other combination sums the shared
    /// channels and drops the rest.
    pub fn accumulate_from(&mut self, other: &AudioBuffer) {
        let dst_count = self.channels.len();
        let src_count = other.channels.len();
        if src_count == 0 || dst_count == 0 {
            return;
        }

        if src_count == 1 && dst_count > 1 {
            for dst in &mut self.channels {
                add_into(dst, &other.channels[0], 1.0);
            }
        } else if dst_count == 1 && src_count > 1 {
            let scale = 1.0 / src_count as f32;
            for src in &other.channels {
                add_into(&mut self.channels[0], src, scale);
            }
        } else {
            for (dst, src) in self.channels.iter_mut().zip(&other.channels) {
                add_into(dst, src, 1.0);
            }
        }
    }
}

fn channel_error(channel: usize, count: usize) -> AudioError {
    AudioError::index_size(format!(
        "channel index {channel} out of range for {count} channels"
    ))
}

fn add_into(dst: &mut [f32], src: &[f32], scale: f32) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d += *s * scale;
    }
}
