use std::{iter::StepBy, ops::Range};

/// `(first column, first row, column step, row step)` of each Adam7 pass.
const ADAM7: [(usize, usize, usize, usize); 7] = [
    (0, 0, 8, 8),
    (4, 0, 8, 8),
    (0, 4, 4, 8),
    (2, 0, 4, 4),
    (0, 2, 2, 4),
    (1, 0, 2, 2),
    (0, 1, 1, 2),
];

/// The pixels of the full image stored by one pass, as a reduced image of their own.
#[derive(Debug)]
pub(crate) struct SubImage {
    pub(crate) width: usize,
    pub(crate) height: usize,
    pub(crate) pixel_indices: PixelIndices,
}
impl SubImage {
    /// Every pixel of a `width` x `height` image, in order.
    pub(crate) fn full(width: usize, height: usize) -> Self {
        Self::sampled(width, height, (0, 0, 1, 1))
    }

    fn sampled(
        image_width: usize,
        image_height: usize,
        (x0, y0, dx, dy): (usize, usize, usize, usize),
    ) -> Self {
        Self {
            width: image_width.saturating_sub(x0).div_ceil(dx),
            height: image_height.saturating_sub(y0).div_ceil(dy),
            pixel_indices: PixelIndices {
                rows: (y0..image_height).step_by(dy),
                columns: (x0..image_width).step_by(dx),
                row: None,
                image_width,
            },
        }
    }

    fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// The non-empty passes of an Adam7 interlaced `width` x `height` image.
pub(crate) fn adam7(width: usize, height: usize) -> impl Iterator<Item = SubImage> {
    ADAM7
        .into_iter()
        .map(move |layout| SubImage::sampled(width, height, layout))
        .filter(|pass| !pass.is_empty())
}

/// Row-major indices, into the full image, of the pixels a pass covers.
#[derive(Debug)]
pub(crate) struct PixelIndices {
    rows: StepBy<Range<usize>>,
    columns: StepBy<Range<usize>>,
    row: Option<(usize, StepBy<Range<usize>>)>,
    image_width: usize,
}
impl Iterator for PixelIndices {
    type Item = usize;
    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((y, columns)) = &mut self.row {
                if let Some(x) = columns.next() {
                    return Some(*y * self.image_width + x);
                }
            }
            let y = self.rows.next()?;
            self.row = Some((y, self.columns.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{adam7, SubImage};

    fn dimensions(width: usize, height: usize) -> Vec<(usize, usize)> {
        adam7(width, height)
            .map(|pass| (pass.width, pass.height))
            .collect()
    }

    #[test]
    fn pass_dimensions() {
        assert_eq!(
            dimensions(8, 8),
            [(1, 1), (1, 1), (2, 1), (2, 2), (4, 2), (4, 4), (8, 4)]
        );
        assert_eq!(
            dimensions(9, 9),
            [(2, 2), (1, 2), (3, 1), (2, 3), (5, 2), (4, 5), (9, 4)]
        );
        assert_eq!(dimensions(4, 4), [(1, 1), (1, 1), (2, 1), (2, 2), (4, 2)]);
        assert_eq!(dimensions(1, 1), [(1, 1)]);
    }

    #[test]
    fn pass_indices_for_an_8x8_image() {
        let passes: Vec<Vec<usize>> = adam7(8, 8)
            .map(|pass| pass.pixel_indices.collect())
            .collect();
        assert_eq!(passes[0], [0]);
        assert_eq!(passes[1], [4]);
        assert_eq!(passes[2], [32, 36]);
        assert_eq!(passes[3], [2, 6, 34, 38]);
        assert_eq!(passes[4], [16, 18, 20, 22, 48, 50, 52, 54]);
        assert_eq!(passes[6][..9], [8, 9, 10, 11, 12, 13, 14, 15, 24]);
        assert_eq!(passes.iter().map(Vec::len).sum::<usize>(), 64);
    }

    #[test]
    fn wide_images_index_rows_by_width() {
        assert_eq!(dimensions(5, 2), [(1, 1), (1, 1), (1, 1), (2, 1), (5, 1)]);

        let mut covered: Vec<usize> = adam7(5, 2).flat_map(|pass| pass.pixel_indices).collect();
        assert_eq!(covered[..3], [0, 4, 2]);
        covered.sort_unstable();
        assert_eq!(covered, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn every_pixel_is_covered_exactly_once() {
        for (width, height) in [(9, 9), (32, 3), (3, 17)] {
            let mut covered: Vec<usize> = adam7(width, height)
                .flat_map(|pass| pass.pixel_indices)
                .collect();
            covered.sort_unstable();
            assert_eq!(covered, (0..width * height).collect::<Vec<_>>());
        }
    }

    #[test]
    fn full_image_is_in_order() {
        let full = SubImage::full(3, 2);
        assert_eq!((full.width, full.height), (3, 2));
        assert_eq!(full.pixel_indices.collect::<Vec<_>>(), [0, 1, 2, 3, 4, 5]);
    }
}
