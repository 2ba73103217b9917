//! GPU resource handles and the resource state model.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// The mode in which the GPU is currently allowed to access a resource.
///
/// Two states are compatible only if they are equal. Read-only states do not
/// automatically combine: a resource in [`ResourceState::DepthRead`] still
/// needs a transition before it can be bound as [`ResourceState::ShaderResource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceState {
    /// Default state, required for cross-queue handoff of some resources.
    Common,
    /// Bound as a vertex buffer or constant buffer.
    VertexAndConstantBuffer,
    /// Bound as an index buffer.
    IndexBuffer,
    /// Bound as a render target.
    RenderTarget,
    /// Bound for unordered (read/write) shader access.
    UnorderedAccess,
    /// Bound as a writable depth target.
    DepthWrite,
    /// Bound as a read-only depth target.
    DepthRead,
    /// Sampled or read in a shader.
    ShaderResource,
    /// Destination of a copy operation.
    CopyDest,
    /// Source of a copy operation.
    CopySource,
    /// Read as indirect draw/dispatch arguments.
    IndirectArgument,
    /// Presentable by the swapchain.
    Present,
}

/// Selects either one subresource of a resource, or all of them at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subresource {
    /// A specific subresource index in `[0, subresource_count)`.
    Index(u32),
    /// Every subresource of the resource.
    All,
}

#[derive(Debug)]
struct ResourceInner {
    name: String,
    subresource_count: u32,
}

/// Handle to a GPU resource.
///
/// Identity is pointer equality on the shared inner object: clones refer to
/// the same resource, and the handle stays valid for as long as any clone is
/// alive. The scheduler never inspects the contents of a resource, only its
/// identity and subresource count.
#[derive(Clone)]
pub struct GpuResource {
    inner: Arc<ResourceInner>,
}

/// Stable identity of a [`GpuResource`], usable as a map key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(usize);

impl GpuResource {
    /// Create a new resource handle with the given number of subresources.
    pub fn new(name: impl Into<String>, subresource_count: u32) -> Self {
        Self {
            inner: Arc::new(ResourceInner {
                name: name.into(),
                subresource_count: subresource_count.max(1),
            }),
        }
    }

    /// Debug name of this resource.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Number of addressable subresources (mip levels, array slices, planes).
    pub fn subresource_count(&self) -> u32 {
        self.inner.subresource_count
    }

    /// Identity of this resource. Two handles compare equal iff their ids are equal.
    pub fn id(&self) -> ResourceId {
        ResourceId(Arc::as_ptr(&self.inner) as usize)
    }

    /// Whether this handle is the last one referring to the resource.
    pub(crate) fn is_unique(&self) -> bool {
        Arc::strong_count(&self.inner) == 1
    }
}

impl PartialEq for GpuResource {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for GpuResource {}

impl Hash for GpuResource {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

// Resources order by identity. Usage lists are sorted with this ordering so
// compatibility checks can merge-walk two lists in linear time.
impl PartialOrd for GpuResource {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GpuResource {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id().cmp(&other.id())
    }
}

impl fmt::Debug for GpuResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GpuResource")
            .field("name", &self.inner.name)
            .field("subresources", &self.inner.subresource_count)
            .finish()
    }
}
