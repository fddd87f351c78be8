//! Owned image planes used throughout the codec.
//!
//! An `Image<T>` is a dense row-major plane; an `Image3<T>` bundles three
//! planes of identical size. Planes own their storage outright, there is no
//! striding or borrowing of external buffers.

#[derive(Debug, Clone, PartialEq)]
pub struct Image<T> {
    xsize: usize,
    ysize: usize,
    data: Vec<T>,
}

impl<T: Copy + Default> Image<T> {
    pub fn new(xsize: usize, ysize: usize) -> Self {
        Self {
            xsize,
            ysize,
            data: vec![T::default(); xsize * ysize],
        }
    }

    pub fn with_value(xsize: usize, ysize: usize, value: T) -> Self {
        Self {
            xsize,
            ysize,
            data: vec![value; xsize * ysize],
        }
    }

    pub fn xsize(&self) -> usize {
        self.xsize
    }

    pub fn ysize(&self) -> usize {
        self.ysize
    }

    pub fn row(&self, y: usize) -> &[T] {
        &self.data[y * self.xsize..(y + 1) * self.xsize]
    }

    pub fn row_mut(&mut self, y: usize) -> &mut [T] {
        &mut self.data[y * self.xsize..(y + 1) * self.xsize]
    }

    pub fn get(&self, x: usize, y: usize) -> T {
        self.data[y * self.xsize + x]
    }

    pub fn set(&mut self, x: usize, y: usize, value: T) {
        self.data[y * self.xsize + x] = value;
    }

    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Image3<T> {
    planes: [Image<T>; 3],
}

impl<T: Copy + Default> Image3<T> {
    pub fn new(xsize: usize, ysize: usize) -> Self {
        Self {
            planes: [
                Image::new(xsize, ysize),
                Image::new(xsize, ysize),
                Image::new(xsize, ysize),
            ],
        }
    }

    pub fn from_planes(planes: [Image<T>; 3]) -> Self {
        debug_assert!(planes[0].xsize() == planes[1].xsize());
        debug_assert!(planes[0].xsize() == planes[2].xsize());
        debug_assert!(planes[0].ysize() == planes[1].ysize());
        debug_assert!(planes[0].ysize() == planes[2].ysize());
        Self { planes }
    }

    pub fn xsize(&self) -> usize {
        self.planes[0].xsize()
    }

    pub fn ysize(&self) -> usize {
        self.planes[0].ysize()
    }

    pub fn plane(&self, c: usize) -> &Image<T> {
        &self.planes[c]
    }

    pub fn plane_mut(&mut self, c: usize) -> &mut Image<T> {
        &mut self.planes[c]
    }
}

pub type ImageF = Image<f32>;
pub type ImageB = Image<u8>;
pub type Image3F = Image3<f32>;
pub type Image3B = Image3<u8>;
pub type Image3U = Image3<u16>;
pub type Image3W = Image3<i32>;

/// Returns a copy of `image` with every sample multiplied by `factor`.
pub fn scale_image(factor: f32, image: &ImageF) -> ImageF {
    let mut out = ImageF::new(image.xsize(), image.ysize());
    for y in 0..image.ysize() {
        let src = image.row(y);
        let dst = out.row_mut(y);
        for x in 0..image.xsize() {
            dst[x] = factor * src[x];
        }
    }
    out
}
