//! Owned YUV frames and the reference buffer rotation.

/// Chroma subsampling of a sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChromaFormat {
    Chroma420,
    Chroma422,
    Chroma444,
}

impl ChromaFormat {
    /// `chroma_format` field of the sequence extension. 0 is reserved.
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(ChromaFormat::Chroma420),
            2 => Some(ChromaFormat::Chroma422),
            3 => Some(ChromaFormat::Chroma444),
            _ => None,
        }
    }

    /// Chroma plane size for a luma plane of `width` x `height`.
    pub fn chroma_size(self, width: u32, height: u32) -> (u32, u32) {
        match self {
            ChromaFormat::Chroma420 => (width / 2, height / 2),
            ChromaFormat::Chroma422 => (width / 2, height),
            ChromaFormat::Chroma444 => (width, height),
        }
    }

    /// Horizontal and vertical chroma shift relative to luma.
    pub fn shifts(self) -> (u32, u32) {
        match self {
            ChromaFormat::Chroma420 => (1, 1),
            ChromaFormat::Chroma422 => (1, 0),
            ChromaFormat::Chroma444 => (0, 0),
        }
    }

    /// Blocks per macroblock (4 luma plus chroma).
    pub fn block_count(self) -> usize {
        match self {
            ChromaFormat::Chroma420 => 6,
            ChromaFormat::Chroma422 => 8,
            ChromaFormat::Chroma444 => 12,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    Top,
    Bottom,
}

impl Field {
    pub fn opposite(self) -> Field {
        match self {
            Field::Top => Field::Bottom,
            Field::Bottom => Field::Top,
        }
    }

    /// `motion_vertical_field_select` value.
    pub fn from_select(bottom: bool) -> Field {
        if bottom { Field::Bottom } else { Field::Top }
    }
}

/// Which lines of a plane an operation addresses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewKind {
    Frame,
    Field(Field),
}

/// Addressing of a frame or field inside one plane buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlaneView {
    pub offset: usize,
    pub stride: usize,
    pub width:  usize,
    pub height: usize,
}

impl PlaneView {
    #[inline]
    pub fn index(&self, x: usize, y: usize) -> usize {
        self.offset + y * self.stride + x
    }
}

/// A planar picture. Planes are tightly packed: the stride equals the plane
/// width.
#[derive(Clone, Debug)]
pub struct YuvFrame {
    pub width:  u32,
    pub height: u32,
    pub chroma_format: ChromaFormat,
    pub chroma_width:  u32,
    pub chroma_height: u32,
    pub y:  Vec<u8>,
    pub cb: Vec<u8>,
    pub cr: Vec<u8>,
}

impl YuvFrame {
    /// Black luma, neutral chroma.
    pub fn new(width: u32, height: u32, chroma_format: ChromaFormat) -> Self {
        let (cw, ch) = chroma_format.chroma_size(width, height);
        let y_sz = (width * height) as usize;
        let c_sz = (cw * ch) as usize;
        YuvFrame {
            width, height, chroma_format,
            chroma_width: cw, chroma_height: ch,
            y:  vec![16u8;  y_sz],
            cb: vec![128u8; c_sz],
            cr: vec![128u8; c_sz],
        }
    }

    /// Plane data and stride. 0 = Y, 1 = Cb, 2 = Cr.
    pub fn plane(&self, index: usize) -> (&[u8], usize) {
        let stride = self.plane_size(index).0 as usize;
        match index {
            0 => (&self.y, stride),
            1 => (&self.cb, stride),
            _ => (&self.cr, stride),
        }
    }

    pub fn plane_mut(&mut self, index: usize) -> (&mut [u8], usize) {
        let stride = self.plane_size(index).0 as usize;
        match index {
            0 => (&mut self.y, stride),
            1 => (&mut self.cb, stride),
            _ => (&mut self.cr, stride),
        }
    }

    pub fn plane_size(&self, index: usize) -> (u32, u32) {
        if index == 0 {
            (self.width, self.height)
        } else {
            (self.chroma_width, self.chroma_height)
        }
    }

    /// Frame or single-field addressing of a plane.
    pub fn view(&self, index: usize, kind: ViewKind) -> PlaneView {
        let (w, h) = self.plane_size(index);
        let (w, h) = (w as usize, h as usize);
        match kind {
            ViewKind::Frame => PlaneView { offset: 0, stride: w, width: w, height: h },
            ViewKind::Field(Field::Top) => PlaneView { offset: 0, stride: 2 * w, width: w, height: h / 2 },
            ViewKind::Field(Field::Bottom) => PlaneView { offset: w, stride: 2 * w, width: w, height: h / 2 },
        }
    }

    pub fn copy_from(&mut self, other: &YuvFrame) {
        self.y.copy_from_slice(&other.y);
        self.cb.copy_from_slice(&other.cb);
        self.cr.copy_from_slice(&other.cr);
    }

    pub fn to_planar_u8(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.y.len() + self.cb.len() + self.cr.len());
        out.extend_from_slice(&self.y);
        out.extend_from_slice(&self.cb);
        out.extend_from_slice(&self.cr);
        out
    }
}

/// Where the picture being decoded is written.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Target {
    Current,
    Scratch,
}

/// Reference frames as seen by the motion compensation of one picture.
pub struct References<'a> {
    /// Source of forward prediction (the earlier anchor).
    pub past: &'a YuvFrame,
    /// Source of backward prediction (the later anchor, B pictures only).
    pub future: &'a YuvFrame,
    /// The first field of the picture being decoded, when the second field
    /// of an I/P pair predicts from it.
    pub same_frame: Option<&'a YuvFrame>,
}

/// Current / forward / backward / scratch buffers.
///
/// `forward` is the most recently completed anchor and `backward` the one
/// before it. A completed I or P picture is promoted (`backward <- forward`,
/// `forward <- current`); B pictures are written to `scratch` and never
/// become references.
pub struct FrameBufferManager {
    current:  YuvFrame,
    forward:  YuvFrame,
    backward: YuvFrame,
    scratch:  YuvFrame,
    same_frame: Option<YuvFrame>,
    same_frame_valid: bool,
    target: Target,
}

impl FrameBufferManager {
    pub fn new(width: u32, height: u32, chroma_format: ChromaFormat) -> Self {
        let f = YuvFrame::new(width, height, chroma_format);
        FrameBufferManager {
            current:  f.clone(),
            forward:  f.clone(),
            backward: f.clone(),
            scratch:  f,
            same_frame: None,
            same_frame_valid: false,
            target: Target::Current,
        }
    }

    /// Start a frame picture or the first field of a pair.
    pub fn begin_frame(&mut self, is_b: bool) {
        self.target = if is_b { Target::Scratch } else { Target::Current };
        self.same_frame_valid = false;
    }

    /// Start the second field of a pair. For I/P pairs the first field is
    /// captured so the second one can predict from it.
    pub fn begin_second_field(&mut self, is_b: bool) {
        if is_b {
            self.same_frame_valid = false;
            return;
        }
        match &mut self.same_frame {
            Some(f) => f.copy_from(&self.current),
            None => self.same_frame = Some(self.current.clone()),
        }
        self.same_frame_valid = true;
    }

    /// Finish the picture in progress, promoting it when it is an anchor.
    pub fn complete_frame(&mut self, is_b: bool) {
        self.same_frame_valid = false;
        if is_b {
            return;
        }
        std::mem::swap(&mut self.backward, &mut self.forward);
        std::mem::swap(&mut self.forward, &mut self.current);
    }

    /// Destination buffer plus the references for a picture of the given type.
    pub fn split(&mut self, is_b: bool) -> (&mut YuvFrame, References<'_>) {
        let FrameBufferManager {
            current, forward, backward, scratch, same_frame, same_frame_valid, target,
        } = self;
        let dest = match *target {
            Target::Current => current,
            Target::Scratch => scratch,
        };
        let refs = if is_b {
            References { past: &*backward, future: &*forward, same_frame: None }
        } else {
            let same = if *same_frame_valid { same_frame.as_ref() } else { None };
            References { past: &*forward, future: &*forward, same_frame: same }
        };
        (dest, refs)
    }

    /// The buffer the picture in progress is written to.
    pub fn destination(&self) -> &YuvFrame {
        match self.target {
            Target::Current => &self.current,
            Target::Scratch => &self.scratch,
        }
    }

    pub fn forward(&self) -> &YuvFrame {
        &self.forward
    }

    pub fn backward(&self) -> &YuvFrame {
        &self.backward
    }
}
