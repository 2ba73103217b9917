//! The implicit upload task at the head of every frame.
//!
//! Pending uploads are expressed as ordinary usage records, so staged data
//! flows through the same barrier-injection path as every other task: the
//! target enters as copy-dest and leaves in its post-upload state through an
//! in-list transition, the staging buffer is read as copy-source.

use anyhow::Result;

use crate::gpu::resource::{GpuResource, ResourceState, Subresource};
use crate::task::{GraphicsTask, RenderContext, SetupContext};

/// Describes one pending upload of staged data into a GPU resource.
#[derive(Debug, Clone)]
pub struct UploadDescription {
    /// Staging buffer holding the CPU-written bytes.
    pub staging: GpuResource,
    /// Resource the data is copied into.
    pub target: GpuResource,
    /// Which subresource(s) of the target receive the data.
    pub subresource: Subresource,
    /// State the target must be left in after the copy.
    pub post_state: ResourceState,
}

pub(crate) struct UploadTask {
    uploads: Vec<UploadDescription>,
}

impl UploadTask {
    pub fn new(uploads: Vec<UploadDescription>) -> Self {
        Self {
            uploads,
        }
    }
}

impl GraphicsTask for UploadTask {
    fn name(&self) -> &str {
        "_upload"
    }

    fn setup(&mut self, ctx: &mut SetupContext) -> Result<()> {
        for upload in &self.uploads {
            ctx.read(&upload.staging, Subresource::All, ResourceState::CopySource);
            if upload.post_state == ResourceState::CopyDest {
                ctx.write(&upload.target, upload.subresource, ResourceState::CopyDest);
            } else {
                ctx.transition(
                    &upload.target,
                    upload.subresource,
                    ResourceState::CopyDest,
                    upload.post_state,
                );
            }
        }
        Ok(())
    }

    fn execute(&mut self, ctx: &mut RenderContext) -> Result<()> {
        for upload in &self.uploads {
            ctx.set_resource_state(&upload.staging, Subresource::All, ResourceState::CopySource)?;
            ctx.set_resource_state(&upload.target, upload.subresource, ResourceState::CopyDest)?;
            ctx.copy_resource(&upload.staging, &upload.target)?;
            if upload.post_state != ResourceState::CopyDest {
                ctx.set_resource_state(&upload.target, upload.subresource, upload.post_state)?;
            }
        }
        Ok(())
    }
}
