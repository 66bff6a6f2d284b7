use bitflags::bitflags;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphicsApi {
    None,
    OpenGl,
    Vulkan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Linux,
    MacOs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueType {
    Graphics,
    Compute,
    Transfer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureType {
    Texture1D,
    Texture2D,
    Texture3D,
    TextureCube,
    Texture1DArray,
    Texture2DArray,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadOp {
    Load,
    #[default]
    Clear,
    DontCare,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreOp {
    #[default]
    Store,
    DontCare,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    Nearest,
    Linear,
    NearestMipmapNearest,
    NearestMipmapLinear,
    LinearMipmapNearest,
    LinearMipmapLinear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureWrap {
    Repeat,
    MirroredRepeat,
    ClampToEdge,
    ClampToBorder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Topology {
    Points,
    Lines,
    LineStrip,
    #[default]
    Triangles,
    TriangleStrip,
    TriangleFan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompareFunc {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    #[default]
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CullMode {
    #[default]
    None,
    Front,
    Back,
    FrontAndBack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillMode {
    #[default]
    Solid,
    Wireframe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendFactor {
    #[default]
    One,
    Zero,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
    SrcColor,
    OneMinusSrcColor,
    DstColor,
    OneMinusDstColor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendOp {
    #[default]
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorType {
    UniformBuffer,
    StorageBuffer,
    UniformBufferDynamic,
    SampledImage,
    StorageImage,
    Sampler,
    CombinedImageSampler,
}

impl DescriptorType {
    /// The six descriptor-type buckets `create_descriptor_pool` sizes
    /// pool-size arrays over (`UBO_DYNAMIC` is distinct from `UBO`).
    pub const ALL: [DescriptorType; 6] = [
        DescriptorType::UniformBuffer,
        DescriptorType::StorageBuffer,
        DescriptorType::UniformBufferDynamic,
        DescriptorType::SampledImage,
        DescriptorType::StorageImage,
        DescriptorType::Sampler,
    ];
}

/// A shader module's single compilation stage, as opposed to
/// `ShaderStageFlags`, which masks a set of stages (push-constant
/// ranges, descriptor binding visibility).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Compute,
}

impl From<ShaderStage> for ShaderStageFlags {
    fn from(stage: ShaderStage) -> Self {
        match stage {
            ShaderStage::Vertex => ShaderStageFlags::VERTEX,
            ShaderStage::Fragment => ShaderStageFlags::FRAGMENT,
            ShaderStage::Compute => ShaderStageFlags::COMPUTE,
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStageFlags: u32 {
        const VERTEX = 1 << 0;
        const FRAGMENT = 1 << 1;
        const COMPUTE = 1 << 2;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BufferUsageFlags: u32 {
        const VERTEX = 1 << 0;
        const INDEX = 1 << 1;
        const UNIFORM = 1 << 2;
        const STORAGE = 1 << 3;
        const TRANSFER_SRC = 1 << 4;
        const TRANSFER_DST = 1 << 5;
        const INDIRECT = 1 << 6;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsageFlags: u32 {
        const SAMPLED = 1 << 0;
        const STORAGE = 1 << 1;
        const COLOR_ATTACHMENT = 1 << 2;
        const DEPTH_STENCIL_ATTACHMENT = 1 << 3;
        const TRANSFER_SRC = 1 << 4;
        const TRANSFER_DST = 1 << 5;
    }
}

/// Resource access/usage states tracked across barrier transitions,
/// including reserved-but-unmapped members kept for forward
/// compatibility with states no current backend implements. Nothing
/// outside `rhi-backend`'s barrier/state-tracking code is expected to
/// construct the `*_UNSUPPORTED` variants.
bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ResourceState: u32 {
        const UNDEFINED = 0;
        const COMMON = 1 << 0;
        const VERTEX_BUFFER = 1 << 1;
        const INDEX_BUFFER = 1 << 2;
        const CONSTANT_BUFFER = 1 << 3;
        const SHADER_RESOURCE = 1 << 4;
        const UNORDERED_ACCESS = 1 << 5;
        const RENDER_TARGET = 1 << 6;
        const DEPTH_WRITE = 1 << 7;
        const DEPTH_READ = 1 << 8;
        const TRANSFER_SRC = 1 << 9;
        const TRANSFER_DST = 1 << 10;
        const PRESENT = 1 << 11;
        /// not mapped to a concrete backend transition; kept distinct so
        /// it doesn't silently alias another state. `format_mapping`
        /// warns and falls back to `COMMON`.
        const INDIRECT_ARGUMENT_UNSUPPORTED = 1 << 12;
        const ACCELERATION_STRUCTURE_READ_UNSUPPORTED = 1 << 13;
        const ACCELERATION_STRUCTURE_WRITE_UNSUPPORTED = 1 << 14;
        const RESOLVE_SRC_UNSUPPORTED = 1 << 15;
        const RESOLVE_DST_UNSUPPORTED = 1 << 16;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ValidationCategory: u32 {
        const NONE = 0;
        const HANDLE = 1 << 0;
        const STATE = 1 << 1;
        const RESOURCE = 1 << 2;
        const SYNCHRONIZATION = 1 << 3;
        const MEMORY = 1 << 4;
        const PIPELINE = 1 << 5;
        const DESCRIPTOR = 1 << 6;
        const COMMAND_LIST = 1 << 7;
        const RENDER_PASS = 1 << 8;
        const ALL = 0xFFFF_FFFF;
    }
}

bitflags! {
    /// `DescriptorPool` discriminant flags. Exactly one of
    /// `DESCRIPTOR_SETS`/`DESCRIPTOR_BUFFER` and exactly one of
    /// `LINEAR`/`POOL` must be set; `MANUAL` is only legal alongside
    /// `DESCRIPTOR_BUFFER`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DescriptorPoolFlags: u32 {
        const DESCRIPTOR_SETS = 1 << 0;
        const DESCRIPTOR_BUFFER = 1 << 1;
        const LINEAR = 1 << 2;
        const POOL = 1 << 3;
        const MANUAL = 1 << 4;
        const UPDATE_AFTER_BIND = 1 << 5;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorHeapType {
    Resources,
    Samplers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MemoryUsage {
    #[default]
    Auto,
    GpuOnly,
    CpuToGpu,
    GpuToCpu,
}
