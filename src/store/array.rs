//! Typed n-dimensional arrays.

use crate::util::{ArrayPod, Bool, Dimensions, Error, PlainOldDataType, Result};

/// A typed n-dimensional array held as raw little-endian element bytes.
///
/// String arrays hold each element as UTF-8 followed by a NUL byte.
/// Equality compares element bytes, so a NaN equals a NaN of the same bit
/// pattern.
#[derive(Clone, Debug, PartialEq)]
pub struct Array {
    pod: PlainOldDataType,
    dims: Dimensions,
    data: Vec<u8>,
}

impl Array {
    /// Build an array of shape `dims` from row-major `values`.
    pub fn from_vec<T: ArrayPod>(dims: impl Into<Dimensions>, values: Vec<T>) -> Result<Self> {
        let dims = dims.into();
        check_len(&dims, values.len())?;
        Ok(Self {
            pod: T::POD_TYPE,
            dims,
            data: bytemuck::cast_slice(&values).to_vec(),
        })
    }

    /// Build a 1-D array.
    pub fn from_slice<T: ArrayPod>(values: &[T]) -> Self {
        Self {
            pod: T::POD_TYPE,
            dims: Dimensions::d1(values.len()),
            data: bytemuck::cast_slice(values).to_vec(),
        }
    }

    /// Build a boolean array of shape `dims`.
    pub fn from_bools(dims: impl Into<Dimensions>, values: &[bool]) -> Result<Self> {
        let values: Vec<Bool> = values.iter().map(|&b| Bool::new(b)).collect();
        Self::from_vec(dims, values)
    }

    /// Build a string array of shape `dims`. Elements may not contain NUL.
    pub fn from_strings<S: AsRef<str>>(dims: impl Into<Dimensions>, values: &[S]) -> Result<Self> {
        let dims = dims.into();
        check_len(&dims, values.len())?;
        let mut data = Vec::new();
        for value in values {
            let value = value.as_ref();
            if value.contains('\0') {
                return Err(Error::InvalidArgument(format!(
                    "string array element {:?} contains NUL",
                    value
                )));
            }
            data.extend_from_slice(value.as_bytes());
            data.push(0);
        }
        Ok(Self { pod: PlainOldDataType::String, dims, data })
    }

    /// A zero-length 1-D array of the given element type.
    pub fn empty(pod: PlainOldDataType) -> Self {
        Self { pod, dims: Dimensions::d1(0), data: Vec::new() }
    }

    /// Rebuild an array from stored parts, checking the byte length.
    pub(crate) fn from_raw(pod: PlainOldDataType, dims: Dimensions, data: Vec<u8>) -> Result<Self> {
        let count = dims
            .checked_num_elements()
            .ok_or_else(|| Error::corrupt(format!("array shape {} overflows", dims)))?;
        if pod.is_string() {
            let terminators = data.iter().filter(|&&b| b == 0).count();
            if terminators != count || data.last().map_or(count != 0, |&b| b != 0) {
                return Err(Error::corrupt(format!(
                    "string array of shape {} holds {} terminated elements",
                    dims, terminators
                )));
            }
            std::str::from_utf8(&data).map_err(|e| Error::corrupt(e.to_string()))?;
        } else {
            let expected = count
                .checked_mul(pod.num_bytes())
                .ok_or_else(|| Error::corrupt(format!("{} array of shape {} overflows", pod, dims)))?;
            if data.len() != expected {
                return Err(Error::corrupt(format!(
                    "{} array of shape {} needs {} bytes, found {}",
                    pod,
                    dims,
                    expected,
                    data.len()
                )));
            }
        }
        Ok(Self { pod, dims, data })
    }

    #[inline]
    pub fn pod(&self) -> PlainOldDataType {
        self.pod
    }

    #[inline]
    pub fn dims(&self) -> &Dimensions {
        &self.dims
    }

    /// Extents, outermost first.
    #[inline]
    pub fn shape(&self) -> &[usize] {
        self.dims.sizes()
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.dims.num_elements()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element bytes as stored.
    pub fn raw_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Copy the elements out as `T`; fails if `T` is not the element type.
    pub fn to_vec<T: ArrayPod>(&self) -> Result<Vec<T>> {
        self.expect_pod(T::POD_TYPE)?;
        Ok(bytemuck::allocation::pod_collect_to_vec(&self.data))
    }

    pub fn to_bools(&self) -> Result<Vec<bool>> {
        Ok(self.to_vec::<Bool>()?.into_iter().map(Bool::get).collect())
    }

    pub fn to_strings(&self) -> Result<Vec<String>> {
        self.expect_pod(PlainOldDataType::String)?;
        let mut out = Vec::with_capacity(self.len());
        for chunk in self.data.split(|&b| b == 0).take(self.len()) {
            out.push(String::from_utf8(chunk.to_vec())?);
        }
        Ok(out)
    }

    fn expect_pod(&self, pod: PlainOldDataType) -> Result<()> {
        if self.pod != pod {
            return Err(Error::TypeMismatch {
                expected: pod.name().to_string(),
                actual: self.pod.name().to_string(),
            });
        }
        Ok(())
    }
}

fn check_len(dims: &Dimensions, len: usize) -> Result<()> {
    match dims.checked_num_elements() {
        Some(count) if count == len => Ok(()),
        Some(count) => Err(Error::InvalidArgument(format!(
            "shape {} holds {} elements, got {}",
            dims, count, len
        ))),
        None => Err(Error::InvalidArgument(format!("shape {} overflows", dims))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use half::f16;

    #[test]
    fn test_typed_access() {
        let a = Array::from_vec((2, 3), vec![1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        assert_eq!(a.pod(), PlainOldDataType::Float64);
        assert_eq!(a.shape(), &[2, 3]);
        assert_eq!(a.len(), 6);
        assert_eq!(a.raw_bytes().len(), 48);
        assert_eq!(a.to_vec::<f64>().unwrap()[4], 5.0);

        let err = a.to_vec::<f32>().unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
    }

    #[test]
    fn test_shape_must_match_len() {
        let err = Array::from_vec(4, vec![1i32, 2, 3]).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_overflowing_shape_rejected() {
        let err = Array::from_vec((usize::MAX, 2), Vec::<u8>::new()).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        let err = Array::from_strings((usize::MAX, 2), &[] as &[&str]).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));

        let err = Array::from_raw(PlainOldDataType::Uint8, Dimensions::from_slice(&[usize::MAX, 2]), Vec::new())
            .unwrap_err();
        assert!(matches!(err, Error::Corrupt(_)));
        // Element count fits but the byte length does not.
        let err = Array::from_raw(PlainOldDataType::Float64, Dimensions::d1(usize::MAX / 2), Vec::new())
            .unwrap_err();
        assert!(matches!(err, Error::Corrupt(_)));
    }

    #[test]
    fn test_nan_equality() {
        let a = Array::from_slice(&[1.0f32, f32::NAN]);
        let b = Array::from_slice(&[1.0f32, f32::NAN]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_strings() {
        let ids = Array::from_strings(3, &["CI.PAS", "", "NC.J051"]).unwrap();
        assert_eq!(ids.pod(), PlainOldDataType::String);
        assert_eq!(ids.to_strings().unwrap(), vec!["CI.PAS", "", "NC.J051"]);

        let rebuilt = Array::from_raw(ids.pod(), ids.dims().clone(), ids.raw_bytes().to_vec()).unwrap();
        assert_eq!(rebuilt, ids);

        assert!(Array::from_strings(1, &["a\0b"]).is_err());
    }

    #[test]
    fn test_from_raw_checks_length() {
        let err = Array::from_raw(PlainOldDataType::Int32, Dimensions::d1(2), vec![0; 7]).unwrap_err();
        assert!(matches!(err, Error::Corrupt(_)));

        let err = Array::from_raw(PlainOldDataType::String, Dimensions::d1(2), b"a\0b".to_vec()).unwrap_err();
        assert!(matches!(err, Error::Corrupt(_)));
    }

    #[test]
    fn test_bools_and_halfs() {
        let mask = Array::from_bools(3, &[true, false, true]).unwrap();
        assert_eq!(mask.to_bools().unwrap(), vec![true, false, true]);

        let h = Array::from_slice(&[f16::from_f32(0.5), f16::from_f32(2.0)]);
        assert_eq!(h.pod(), PlainOldDataType::Float16);
        assert_eq!(h.to_vec::<f16>().unwrap()[1].to_f32(), 2.0);
    }

    #[test]
    fn test_empty_and_scalar() {
        let e = Array::empty(PlainOldDataType::Uint8);
        assert!(e.is_empty());
        assert_eq!(e.shape(), &[0]);

        let s = Array::from_vec(Dimensions::scalar(), vec![7u16]).unwrap();
        assert_eq!(s.len(), 1);
        assert!(s.dims().is_scalar());
    }
}
