//! Typed, shaped views over interpreted buffer bytes
//!
//! An [`ArrayView`] is the numeric interop surface of the object model. It
//! pairs decoded bytes with the dtype, byte order, dimension order and shape
//! the validator established for them. Reading elements is zero-copy when the
//! bytes are native-endian and suitably aligned; otherwise values are
//! converted into an owned vector.

use std::borrow::Cow;
use std::rc::Rc;

use histbuf_core::validation::{element_count, shape_product};
use histbuf_core::{DType, DimensionOrder, Element, Endianness, HistError, Slice};

use crate::error::{structure, Result};
use crate::validate::Shape;

enum Storage<'a> {
    Shared(Rc<[u8]>),
    Borrowed(&'a [u8]),
}

/// Numeric view of an interpreted buffer
pub struct ArrayView<'a> {
    data: Storage<'a>,
    dtype: DType,
    endianness: Endianness,
    order: DimensionOrder,
    shape: Shape,
}

impl ArrayView<'static> {
    pub(crate) fn shared(
        data: Rc<[u8]>,
        dtype: DType,
        endianness: Endianness,
        order: DimensionOrder,
        shape: Shape,
    ) -> Self {
        Self {
            data: Storage::Shared(data),
            dtype,
            endianness,
            order,
            shape,
        }
    }
}

impl<'a> ArrayView<'a> {
    pub(crate) fn borrowed(
        data: &'a [u8],
        dtype: DType,
        endianness: Endianness,
        order: DimensionOrder,
        shape: Shape,
    ) -> Self {
        Self {
            data: Storage::Borrowed(data),
            dtype,
            endianness,
            order,
            shape,
        }
    }

    /// Declared dtype; `none` reads as `uint8`
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    pub fn order(&self) -> DimensionOrder {
        self.order
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Raw decoded bytes in storage order
    pub fn bytes(&self) -> &[u8] {
        match &self.data {
            Storage::Shared(data) => data,
            Storage::Borrowed(data) => data,
        }
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.bytes().len() / self.dtype.itemsize()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Elements as `T`, borrowed when the bytes allow it
    pub fn as_slice<T: Element>(&self) -> Result<Cow<'_, [T]>> {
        let dtype = self.dtype.effective();
        if T::DTYPE != dtype {
            return Err(HistError::constraint(
                "ArrayView",
                "dtype",
                format!("buffer holds {dtype}, not {}", T::DTYPE),
            )
            .into());
        }
        let bytes = self.bytes();
        if self.endianness.is_native() {
            if let Ok(values) = bytemuck::try_cast_slice::<u8, T>(bytes) {
                return Ok(Cow::Borrowed(values));
            }
        }
        let native = self.endianness.is_native();
        Ok(Cow::Owned(
            bytes
                .chunks_exact(T::size_bytes())
                .map(|chunk| {
                    let value: T = bytemuck::pod_read_unaligned(chunk);
                    if native {
                        value
                    } else {
                        value.swap_bytes()
                    }
                })
                .collect(),
        ))
    }

    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        Ok(self.as_slice::<T>()?.into_owned())
    }

    /// Every element widened to `f64`, in storage order
    pub fn to_f64_vec(&self) -> Result<Vec<f64>> {
        match self.dtype.effective() {
            DType::Int8 => self.widen::<i8>(),
            DType::Uint8 | DType::None => self.widen::<u8>(),
            DType::Int16 => self.widen::<i16>(),
            DType::Uint16 => self.widen::<u16>(),
            DType::Int32 => self.widen::<i32>(),
            DType::Uint32 => self.widen::<u32>(),
            DType::Int64 => self.widen::<i64>(),
            DType::Uint64 => self.widen::<u64>(),
            DType::Float32 => self.widen::<f32>(),
            DType::Float64 => self.widen::<f64>(),
        }
    }

    fn widen<T: Element>(&self) -> Result<Vec<f64>> {
        Ok(self.as_slice::<T>()?.iter().map(|&x| x.to_f64()).collect())
    }

    /// Position in storage of a multi-dimensional index
    pub fn flat_index(&self, index: &[usize]) -> Result<usize> {
        if index.len() != self.shape.len() {
            return Err(structure(format!(
                "index {index:?} does not match rank {} of shape {:?}",
                self.shape.len(),
                self.shape
            )));
        }
        if let Some((i, dim)) = index.iter().zip(&self.shape).find(|(i, dim)| i >= dim) {
            return Err(structure(format!(
                "index {i} is out of bounds for dimension of length {dim}"
            )));
        }
        let pairs = index.iter().zip(&self.shape);
        let flat = match self.order {
            DimensionOrder::C => pairs.fold(0, |acc, (&i, &dim)| acc * dim + i),
            DimensionOrder::Fortran => pairs.rev().fold(0, |acc, (&i, &dim)| acc * dim + i),
        };
        Ok(flat)
    }

    /// One element, widened to `f64`
    pub fn get_f64(&self, index: &[usize]) -> Result<f64> {
        let flat = self.flat_index(index)?;
        let size = self.dtype.itemsize();
        let chunk = self
            .bytes()
            .get(flat * size..(flat + 1) * size)
            .ok_or_else(|| structure(format!("element {flat} is beyond the end of the buffer")))?;
        let view = ArrayView::borrowed(chunk, self.dtype, self.endianness, self.order, vec![1]);
        Ok(view.to_f64_vec()?[0])
    }
}

impl std::fmt::Debug for ArrayView<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArrayView")
            .field("dtype", &self.dtype)
            .field("endianness", &self.endianness)
            .field("order", &self.order)
            .field("shape", &self.shape)
            .finish()
    }
}

/// Number of `itemsize`-byte elements left after applying `slice`
pub(crate) fn sliced_count(byte_len: usize, itemsize: usize, slice: Option<&Slice>) -> Result<usize> {
    let count = element_count(byte_len, itemsize)?;
    match slice {
        Some(slice) => Ok(slice.len(count)?),
        None => Ok(count),
    }
}

/// Apply a post-decode slice to whole elements of `itemsize` bytes
pub(crate) fn gather(bytes: Rc<[u8]>, itemsize: usize, slice: Option<&Slice>) -> Result<Rc<[u8]>> {
    let Some(slice) = slice else {
        return Ok(bytes);
    };
    let count = element_count(bytes.len(), itemsize)?;
    if slice.is_identity(count)? {
        return Ok(bytes);
    }
    let indices = slice.indices(count)?;
    let mut out = Vec::with_capacity(indices.len * itemsize);
    for pos in indices.positions() {
        out.extend_from_slice(&bytes[pos * itemsize..(pos + 1) * itemsize]);
    }
    Ok(out.into())
}

/// Check that `bytes` hold exactly as many elements as `shape` describes
pub(crate) fn check_elements(what: &str, count: usize, shape: &[usize]) -> Result<()> {
    let expected = shape_product(shape)?;
    if count != expected {
        return Err(structure(format!(
            "{what} has {count} elements but shape {shape:?} requires {expected}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorCategory;

    fn be_view(values: &[i32], shape: Shape) -> ArrayView<'static> {
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_be_bytes()).collect();
        ArrayView::shared(bytes.into(), DType::Int32, Endianness::Big, DimensionOrder::C, shape)
    }

    #[test]
    fn test_native_slice_is_borrowed() {
        let values = [1.5f64, -2.0, 3.25];
        let view = ArrayView::borrowed(
            bytemuck::cast_slice(&values),
            DType::Float64,
            Endianness::native(),
            DimensionOrder::C,
            vec![3],
        );
        let slice = view.as_slice::<f64>().unwrap();
        assert!(matches!(slice, Cow::Borrowed(_)));
        assert_eq!(&*slice, &values);
        assert_eq!(view.len(), 3);
    }

    #[test]
    fn test_foreign_byte_order_is_converted() {
        let view = be_view(&[1, -2, 300], vec![3]);
        assert_eq!(view.to_vec::<i32>().unwrap(), vec![1, -2, 300]);
        assert_eq!(view.to_f64_vec().unwrap(), vec![1.0, -2.0, 300.0]);
    }

    #[test]
    fn test_dtype_mismatch() {
        let view = be_view(&[1, 2], vec![2]);
        let err = view.as_slice::<f32>().unwrap_err();
        assert_eq!(err.category(), Some(ErrorCategory::AttributeConstraint));
    }

    #[test]
    fn test_flat_index_orders() {
        let c = be_view(&[0, 1, 2, 3, 4, 5], vec![2, 3]);
        assert_eq!(c.flat_index(&[1, 0]).unwrap(), 3);
        assert_eq!(c.get_f64(&[1, 2]).unwrap(), 5.0);

        let bytes: Vec<u8> = [0i32, 1, 2, 3, 4, 5].iter().flat_map(|v| v.to_be_bytes()).collect();
        let f = ArrayView::shared(
            bytes.into(),
            DType::Int32,
            Endianness::Big,
            DimensionOrder::Fortran,
            vec![2, 3],
        );
        assert_eq!(f.flat_index(&[1, 0]).unwrap(), 1);
        assert_eq!(f.flat_index(&[0, 2]).unwrap(), 4);

        assert!(c.flat_index(&[2, 0]).is_err());
        assert!(c.flat_index(&[0]).is_err());
    }

    #[test]
    fn test_gather() {
        let bytes: Rc<[u8]> = (0u8..10).collect::<Vec<_>>().into();
        let evens = gather(bytes.clone(), 2, Some(&Slice::new(None, None, Some(2)))).unwrap();
        assert_eq!(&*evens, &[0, 1, 4, 5, 8, 9]);

        let same = gather(bytes.clone(), 1, Some(&Slice::default())).unwrap();
        assert!(Rc::ptr_eq(&same, &bytes));

        assert_eq!(sliced_count(10, 2, Some(&Slice::range(1, 3))).unwrap(), 2);
        assert!(sliced_count(9, 2, None).is_err());
    }

    #[test]
    fn test_check_elements() {
        assert!(check_elements("counts", 12, &[3, 4]).is_ok());
        let err = check_elements("counts", 11, &[3, 4]).unwrap_err();
        assert!(err.is_structural());
    }
}
