use crate::{atlas::PoseAtlas, error::ConfigError};

/// Settings for placing and animating a crowd of instances.
#[derive(Debug, PartialEq, Clone)]
pub struct CrowdConfig {
    /// The number of animated instances.
    pub instance_count: u32,
    /// The number of instances in each row of the placement grid.
    pub columns: u32,
    /// The distance between neighboring instances in the grid.
    pub spacing: f32,
    /// The rate used to bake and play back clips.
    pub fps: f32,
    /// The number of instance buffers to rotate between.
    pub frames_in_flight: usize,
}

impl Default for CrowdConfig {
    fn default() -> Self {
        Self {
            instance_count: 1000,
            columns: 100,
            spacing: 1.0,
            fps: 10.0,
            frames_in_flight: 3,
        }
    }
}

impl CrowdConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.instance_count == 0 {
            return Err(ConfigError::NoInstances);
        }
        if self.columns == 0 {
            return Err(ConfigError::NoColumns);
        }
        if !self.fps.is_finite() || self.fps <= 0.0 {
            return Err(ConfigError::FramesPerSecond(self.fps));
        }
        if self.frames_in_flight < 2 {
            return Err(ConfigError::FramesInFlight(self.frames_in_flight));
        }
        Ok(())
    }

    /// Check that `atlas` was baked at the playback rate.
    /// Playing rows at a different rate changes the speed of every clip.
    pub fn validate_atlas(&self, atlas: &PoseAtlas) -> Result<(), ConfigError> {
        if self.fps != atlas.fps {
            return Err(ConfigError::AtlasFramesPerSecond {
                config: self.fps,
                atlas: atlas.fps,
            });
        }
        Ok(())
    }
}
