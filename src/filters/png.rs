use crate::error::DecompressError;

/// Per-row filter type byte of PNG predicted data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowFilter {
    None,
    Sub,
    Up,
    Average,
    Paeth,
}

impl TryFrom<u8> for RowFilter {
    type Error = DecompressError;

    fn try_from(n: u8) -> Result<RowFilter, DecompressError> {
        match n {
            0 => Ok(RowFilter::None),
            1 => Ok(RowFilter::Sub),
            2 => Ok(RowFilter::Up),
            3 => Ok(RowFilter::Average),
            4 => Ok(RowFilter::Paeth),
            _ => Err(DecompressError::Predictor(n)),
        }
    }
}

fn paeth(left: u8, above: u8, upper_left: u8) -> u8 {
    let estimate = i16::from(left) + i16::from(above) - i16::from(upper_left);
    let distance = |value: u8| (estimate - i16::from(value)).abs();

    let (left_distance, above_distance) = (distance(left), distance(above));
    if left_distance <= above_distance && left_distance <= distance(upper_left) {
        left
    } else if above_distance <= distance(upper_left) {
        above
    } else {
        upper_left
    }
}

/// Undo the filter of one row in place. `previous` is the already decoded row
/// above (all zeros for the first row).
pub fn unfilter_row(filter: RowFilter, bpp: usize, previous: &[u8], current: &mut [u8]) {
    let bpp = bpp.clamp(1, current.len().max(1));

    for i in 0..current.len() {
        let left = if i >= bpp { current[i - bpp] } else { 0 };
        let above = previous[i];
        let upper_left = if i >= bpp { previous[i - bpp] } else { 0 };
        let prediction = match filter {
            RowFilter::None => 0,
            RowFilter::Sub => left,
            RowFilter::Up => above,
            RowFilter::Average => ((u16::from(left) + u16::from(above)) / 2) as u8,
            RowFilter::Paeth => paeth(left, above, upper_left),
        };
        current[i] = current[i].wrapping_add(prediction);
    }
}

/// Decode PNG predicted data made of rows of `bytes_per_row` bytes, each
/// preceded by its filter type byte. A truncated final row is decoded as far as
/// it goes.
///
/// Row buffers never grow past the length of `content`, whatever row size the
/// stream parameters claim.
pub fn decode_frame(content: &[u8], bytes_per_pixel: usize, bytes_per_row: usize) -> Result<Vec<u8>, DecompressError> {
    let row_buffer = bytes_per_row.min(content.len());
    let mut decoded = Vec::with_capacity(content.len());
    let mut previous = vec![0_u8; row_buffer];
    let mut current = vec![0_u8; row_buffer];

    for row in content.chunks(bytes_per_row.saturating_add(1)) {
        let (&filter, data) = match row.split_first() {
            Some(split) => split,
            None => break,
        };
        let filter = RowFilter::try_from(filter)?;

        current.fill(0);
        current[..data.len()].copy_from_slice(data);
        unfilter_row(filter, bytes_per_pixel, &previous, &mut current);
        decoded.extend_from_slice(&current[..data.len()]);
        std::mem::swap(&mut previous, &mut current);
    }

    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn up_and_sub_rows() {
        let content = [2, 1, 2, 3, 2, 1, 1, 1, 1, 10, 1, 1];
        let decoded = decode_frame(&content, 1, 3).unwrap();
        assert_eq!(decoded, vec![1, 2, 3, 2, 3, 4, 10, 11, 12]);
    }

    #[test]
    fn paeth_and_average_rows() {
        let content = [0, 10, 20, 4, 5, 5, 3, 0, 0];
        let decoded = decode_frame(&content, 1, 2).unwrap();
        // Paeth: 5 + paeth(0, 10, 0) = 15; 5 + paeth(15, 20, 10) = 25.
        // Average: 0 + (0 + 15) / 2 = 7; 0 + (7 + 25) / 2 = 16.
        assert_eq!(decoded, vec![10, 20, 15, 25, 7, 16]);
    }

    #[test]
    fn truncated_final_row() {
        let decoded = decode_frame(&[0, 1, 2, 3, 2, 1], 1, 3).unwrap();
        assert_eq!(decoded, vec![1, 2, 3, 2]);
    }

    #[test]
    fn row_wider_than_content() {
        assert_eq!(decode_frame(&[1, 1, 2, 3], 2, usize::MAX).unwrap(), vec![1, 2, 4]);
        assert_eq!(decode_frame(&[0], 1, usize::MAX / 2).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn invalid_row_type() {
        assert!(matches!(decode_frame(&[7, 1, 2], 1, 2), Err(DecompressError::Predictor(7))));
    }
}
