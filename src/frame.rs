use std::sync::Arc;

/// Byte layout of a captured frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOrder {
    Rgb,
    Bgr,
    Rgba,
    Bgra,
    Gray,
}

impl ChannelOrder {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            ChannelOrder::Rgb | ChannelOrder::Bgr => 3,
            ChannelOrder::Rgba | ChannelOrder::Bgra => 4,
            ChannelOrder::Gray => 1,
        }
    }

    /// Layout written to disk for this capture order.
    pub fn storage(self) -> ChannelOrder {
        match self {
            ChannelOrder::Rgb | ChannelOrder::Bgr => ChannelOrder::Rgb,
            ChannelOrder::Rgba | ChannelOrder::Bgra => ChannelOrder::Rgba,
            ChannelOrder::Gray => ChannelOrder::Gray,
        }
    }
}

/// Raster observation produced by an environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub order: ChannelOrder,
    pub data: Vec<u8>,
}

/// Frames are shared between consecutive transitions (next of `i` is prior of `i+1`).
pub type Observation = Arc<Frame>;

impl Frame {
    pub fn new(width: u32, height: u32, order: ChannelOrder, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            order,
            data,
        }
    }

    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.order.bytes_per_pixel()
    }

    /// Pixel data in storage order: blue/red swapped back for BGR captures.
    pub fn to_storage(&self) -> (ChannelOrder, Vec<u8>) {
        let mut data = self.data.clone();
        match self.order {
            ChannelOrder::Bgr => {
                for px in data.chunks_exact_mut(3) {
                    px.swap(0, 2);
                }
            }
            ChannelOrder::Bgra => {
                for px in data.chunks_exact_mut(4) {
                    px.swap(0, 2);
                }
            }
            ChannelOrder::Rgb | ChannelOrder::Rgba | ChannelOrder::Gray => {}
        }
        (self.order.storage(), data)
    }

    /// Packs pixels as 0RGB for window blitting.
    pub fn blit_u32(&self, out: &mut [u32]) {
        let bpp = self.order.bytes_per_pixel();
        for (dst, src) in out.iter_mut().zip(self.data.chunks_exact(bpp)) {
            let (r, g, b) = match self.order {
                ChannelOrder::Rgb | ChannelOrder::Rgba => (src[0], src[1], src[2]),
                ChannelOrder::Bgr | ChannelOrder::Bgra => (src[2], src[1], src[0]),
                ChannelOrder::Gray => (src[0], src[0], src[0]),
            };
            *dst = ((r as u32) << 16) | ((g as u32) << 8) | (b as u32);
        }
    }
}
