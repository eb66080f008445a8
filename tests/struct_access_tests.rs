//! Integration tests for typed field access through heap pointers

use rawstruct::{FieldSchema, FieldType, HeapAllocator, StructError, StructSchema};

fn allocator() -> HeapAllocator {
    let simple = StructSchema::new("SimpleTypes")
        .field(FieldSchema::new("lnumber", FieldType::Long))
        .field(FieldSchema::new("inumber", FieldType::Int))
        .field(FieldSchema::new("c", FieldType::Char))
        .field(FieldSchema::new("b", FieldType::Byte));

    let arrays = StructSchema::new("ArrayTypes")
        .field(FieldSchema::new("barray", FieldType::Byte).with_len(2))
        .field(FieldSchema::new("carray", FieldType::Char).with_len(3))
        .field(FieldSchema::new("iarray", FieldType::Int).with_len(4))
        .field(FieldSchema::new("larray", FieldType::Long).with_len(5))
        .field(FieldSchema::new("string", FieldType::String).with_len(6));

    let compatible = StructSchema::new("CCompatible")
        .with_c_compatible(true)
        .with_pad(8)
        .field(FieldSchema::new("l", FieldType::Long))
        .field(FieldSchema::new("c", FieldType::Char))
        .field(FieldSchema::new("carray", FieldType::Char).with_len(2))
        .field(FieldSchema::new("string", FieldType::String).with_len(4))
        .field(FieldSchema::new("string2", FieldType::String).with_len(4));

    let nested = StructSchema::new("WithNestedStruct")
        .with_c_compatible(true)
        .with_pad(8)
        .field(FieldSchema::structure("compatible", "CCompatible"));

    let nested_array = StructSchema::new("WithNestedArray")
        .with_c_compatible(true)
        .with_pad(8)
        .field(FieldSchema::structure("array", "WithNestedStruct").with_len(2));

    HeapAllocator::new(vec![simple, arrays, compatible, nested, nested_array]).unwrap()
}

fn units(text: &str) -> Vec<u16> {
    text.encode_utf16().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_types() {
        let allocator = allocator();
        let ptr = allocator.allocate("SimpleTypes").unwrap();
        let simple = ptr.deref();

        simple.set_long("lnumber", i64::MAX).unwrap();
        simple.set_int("inumber", i32::MIN).unwrap();
        simple.set_char("c", 0x20AC).unwrap();
        simple.set_byte("b", i8::MAX).unwrap();

        assert_eq!(simple.get_long("lnumber").unwrap(), i64::MAX);
        assert_eq!(simple.get_int("inumber").unwrap(), i32::MIN);
        assert_eq!(simple.get_char("c").unwrap(), 0x20AC);
        assert_eq!(simple.get_byte("b").unwrap(), i8::MAX);
        assert_eq!(simple.size(), 15);
    }

    #[test]
    fn test_array_types() {
        let allocator = allocator();
        let ptr = allocator.allocate("ArrayTypes").unwrap();
        let arrays = ptr.deref();

        arrays.set_bytes("barray", &[b'1' as i8, b'2' as i8]).unwrap();
        arrays.set_chars("carray", &units("123")).unwrap();
        arrays.set_ints("iarray", &[1, 2, 3, 4]).unwrap();
        arrays.set_longs("larray", &[1, 2, 3, 4, 5]).unwrap();
        arrays.set_string("string", "123456").unwrap();

        assert_eq!(arrays.get_bytes("barray").unwrap(), vec![b'1' as i8, b'2' as i8]);
        assert_eq!(arrays.get_chars("carray").unwrap(), units("123"));
        assert_eq!(arrays.get_ints("iarray").unwrap(), vec![1, 2, 3, 4]);
        assert_eq!(arrays.get_longs("larray").unwrap(), vec![1, 2, 3, 4, 5]);
        assert_eq!(arrays.get_string("string").unwrap(), "123456");
        assert_eq!(arrays.size(), 76);
    }

    #[test]
    fn test_c_compatible() {
        let allocator = allocator();
        let ptr = allocator.allocate("CCompatible").unwrap();
        let compatible = ptr.deref();

        compatible.set_long("l", i64::MIN).unwrap();
        compatible.set_char("c", u16::from(b'$')).unwrap();
        compatible.set_chars("carray", &units("xa_")).unwrap();
        compatible.set_string("string", "123").unwrap();
        compatible.set_string("string2", "123-too-long").unwrap();

        assert_eq!(compatible.get_long("l").unwrap(), i64::MIN);
        assert_eq!(compatible.get_char("c").unwrap(), u16::from(b'$'));
        assert_eq!(compatible.get_chars("carray").unwrap(), units("xa"));
        assert_eq!(compatible.get_string("string").unwrap(), "123");
        assert_eq!(compatible.get_string("string2").unwrap(), "123");
        assert_eq!(compatible.size(), 24);
    }

    #[test]
    fn test_nested_struct() {
        let allocator = allocator();
        let ptr = allocator.allocate_zeroed("WithNestedStruct").unwrap();
        let nested = ptr.deref();
        let compatible = nested.get_struct("compatible").unwrap();

        compatible.set_string("string", "12").unwrap();

        assert_eq!(nested.get_struct("compatible").unwrap().get_string("string").unwrap(), "12");
        assert_eq!(compatible.size(), nested.size());
        assert_eq!(compatible.address(), nested.address());
    }

    #[test]
    fn test_nested_struct_array() {
        let allocator = allocator();
        let ptr = allocator.allocate_zeroed("WithNestedArray").unwrap();
        let outer = ptr.deref();
        let array = outer.get_struct_array("array").unwrap();

        array
            .get(1)
            .unwrap()
            .get_struct("compatible")
            .unwrap()
            .set_string("string", "AB")
            .unwrap();

        let second = outer.get_struct_at("array", 1).unwrap();
        assert_eq!(second.get_struct("compatible").unwrap().get_string("string").unwrap(), "AB");
        assert_eq!(array.get(0).unwrap().get_struct("compatible").unwrap().get_string("string").unwrap(), "");
        assert_eq!(2 * array.get(0).unwrap().size(), outer.size());
        assert_eq!(array.size(), 2);
        assert!(matches!(array.get(2), Err(StructError::IndexOutOfRange { index: 2, size: 2 })));
    }

    #[test]
    fn test_nested_view_shares_parent_memory() {
        let allocator = allocator();
        let mut ptr = allocator.allocate_zeroed("WithNestedStruct").unwrap();
        ptr.deref().get_struct("compatible").unwrap().set_long("l", 0x0102_0304_0506_0708).unwrap();

        let bytes = ptr.as_bytes_mut();
        assert_eq!(&bytes[..8], &0x0102_0304_0506_0708i64.to_ne_bytes());
    }

    #[test]
    fn test_scalar_accessor_addresses_first_element() {
        let allocator = allocator();
        let ptr = allocator.allocate_zeroed("ArrayTypes").unwrap();
        let arrays = ptr.deref();

        arrays.set_ints("iarray", &[5, 6, 7, 8]).unwrap();
        assert_eq!(arrays.get_int("iarray").unwrap(), 5);
        assert_eq!(arrays.get_int_at("iarray", 3).unwrap(), 8);

        arrays.set_long_at("larray", 4, -9).unwrap();
        assert_eq!(arrays.get_longs("larray").unwrap(), vec![0, 0, 0, 0, -9]);
        assert!(matches!(
            arrays.set_byte_at("barray", 2, 1),
            Err(StructError::IndexOutOfRange { index: 2, size: 2 })
        ));
    }

    #[test]
    fn test_struct_field_type_checked() {
        let allocator = allocator();
        let ptr = allocator.allocate_zeroed("WithNestedStruct").unwrap();
        let view = ptr.deref();

        assert!(matches!(view.get_int("compatible"), Err(StructError::InvalidArgument { .. })));
        assert!(matches!(
            view.get_struct_at("compatible", 1),
            Err(StructError::IndexOutOfRange { index: 1, size: 1 })
        ));
        assert!(matches!(
            view.get_struct("compatible").unwrap().get_struct("l"),
            Err(StructError::InvalidArgument { .. })
        ));
    }
}
