//! Basic usage example of rawstruct allocators

use rawstruct::{
    FieldSchema, FieldType, HeapAllocator, MmapAllocator, MmapConfig, Result, StructAllocator, StructSchema,
};
use tracing_subscriber::EnvFilter;

fn schemas() -> Vec<StructSchema> {
    vec![
        StructSchema::new("Vec3")
            .with_c_compatible(true)
            .field(FieldSchema::new("x", FieldType::Int))
            .field(FieldSchema::new("y", FieldType::Int))
            .field(FieldSchema::new("z", FieldType::Int)),
        StructSchema::new("Body")
            .with_c_compatible(true)
            .with_pad(8)
            .field(FieldSchema::new("id", FieldType::Long))
            .field(FieldSchema::new("name", FieldType::String).with_len(16))
            .field(FieldSchema::structure("position", "Vec3"))
            .field(FieldSchema::structure("history", "Vec3").with_len(4)),
    ]
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rawstruct=debug")))
        .init();

    println!("rawstruct Example");
    println!("=================");

    // Layouts are resolved once per allocator
    let heap = HeapAllocator::new(schemas())?;
    let body = heap.descriptor("Body")?;
    println!("Resolved {}", body);
    for field in body.fields() {
        println!("  {:<10} offset {:>3}  width {:>2}  len {}", field.name, field.offset, field.width, field.len);
    }

    // Heap allocation
    let mut bodies = heap.allocate_array_zeroed(3, "Body")?;
    for (i, element) in bodies.iter().enumerate() {
        element.set_long("id", i as i64)?;
        element.set_string("name", &format!("body-{}", i))?;
        let position = element.get_struct("position")?;
        position.set_int("x", i as i32 * 10)?;
    }

    heap.resize(&mut bodies, 5)?;
    bodies.clear(3)?;
    bodies.clear(4)?;
    println!("Heap array at {} holds {} bodies", bodies, bodies.size());
    for element in bodies.iter().take(3) {
        println!("  {} at x={}", element.get_string("name")?, element.get_struct("position")?.get_int("x")?);
    }
    bodies.free();

    // File-backed mapping
    let path = std::env::temp_dir().join("rawstruct_example.map");
    let mapped = MmapAllocator::with_config(schemas(), MmapConfig::new().with_remove_on_free(true))?;
    let array = mapped.map_file(&path, 2, "Body")?;
    array.get(1)?.set_string("name", "persisted")?;
    array.flush()?;
    println!("Mapped {} bytes at {}", array.byte_len(), path.display());
    drop(array);

    // Caller-owned buffer
    let mut buffer = vec![0u8; 256];
    let view = mapped.wrap_buffer(&mut buffer, "Vec3")?;
    view.get(2)?.set_int("z", -1)?;
    println!("Buffer holds {} Vec3 structs", view.size());

    println!("Example completed successfully!");
    Ok(())
}
