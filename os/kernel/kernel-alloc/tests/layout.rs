use kernel_alloc::{
    ALLOC_FILL, LayoutError, MemoryRange, OffsetMapper, PAGE_SIZE, PageAllocator, PhysAddr,
    PhysMapper,
};
use kernel_info::memory::{KERNBASE, PHYSTOP};
use kernel_sync::hosted::ThreadCpus;

fn pa(value: u64) -> PhysAddr {
    PhysAddr::from_u64(value)
}

#[test]
fn page_rounding() {
    assert_eq!(pa(0x1001).page_round_down(), pa(0x1000));
    assert_eq!(pa(0x1001).page_round_up(), pa(0x2000));
    assert_eq!(pa(0x2000).page_round_up(), pa(0x2000));
    assert!(pa(0x3000).is_page_aligned());
    assert!(!pa(0x3008).is_page_aligned());
    assert_eq!(pa(0x3000) - pa(0x1000), 0x2000);
    assert_eq!(format!("{}", pa(0x1000)), "0x0000000000001000");
}

#[test]
fn range_validation() {
    assert_eq!(
        MemoryRange::new(pa(0x4000), pa(0x4000)),
        Err(LayoutError::Empty {
            start: pa(0x4000),
            end: pa(0x4000)
        })
    );
    assert_eq!(
        MemoryRange::new(pa(0x1000), pa(0x4800)),
        Err(LayoutError::UnalignedEnd(pa(0x4800)))
    );
    assert_eq!(
        MemoryRange::new(pa(0x3001), pa(0x4000)),
        Err(LayoutError::NoWholePage {
            start: pa(0x3001),
            end: pa(0x4000)
        })
    );
    assert!(MemoryRange::new(pa(0x3000), pa(0x4000)).is_ok());
}

#[test]
fn range_pages() {
    let range = MemoryRange::new(pa(0x1010), pa(0x5000)).unwrap();
    let pages: Vec<_> = range.pages().collect();
    assert_eq!(pages, vec![pa(0x2000), pa(0x3000), pa(0x4000)]);
    assert_eq!(range.page_count(), 3);

    assert!(range.contains_page(pa(0x4000)));
    assert!(range.contains_page(pa(0x1010)));
    assert!(!range.contains_page(pa(0x1000)));
    assert!(!range.contains_page(pa(0x5000)));
}

#[test]
fn range_above_kernel_ends_at_phystop() {
    let range = MemoryRange::above_kernel(pa(KERNBASE + 0x2_1234)).unwrap();
    assert_eq!(range.end(), pa(PHYSTOP));
    assert_eq!(range.page_count(), (PHYSTOP - KERNBASE - 0x2_2000) / PAGE_SIZE);

    assert!(matches!(
        MemoryRange::above_kernel(pa(PHYSTOP)),
        Err(LayoutError::Empty { .. })
    ));
}

#[test]
fn layout_error_messages() {
    let err = MemoryRange::new(pa(0x1000), pa(0x1800)).unwrap_err();
    assert_eq!(
        err.to_string(),
        "end of physical memory 0x0000000000001800 is not page aligned"
    );
}

#[repr(C, align(4096))]
struct HostPage([u8; 4096]);

#[test]
fn identity_mapped_allocator_over_host_memory() {
    let mut ram: Vec<HostPage> = (0..4).map(|_| HostPage([0; 4096])).collect();
    let base = ram.as_mut_ptr().expose_provenance() as u64;
    let range = MemoryRange::new(pa(base), pa(base + 4 * PAGE_SIZE)).unwrap();

    let kmem: PageAllocator<OffsetMapper, ThreadCpus, 1> =
        PageAllocator::new(OffsetMapper::identity(), ThreadCpus::new(), range);
    ThreadCpus::bind(0);
    assert_eq!(unsafe { kmem.init() }, 4);

    let top = kmem.allocate().unwrap();
    assert_eq!(top, pa(base + 3 * PAGE_SIZE));
    let p: *mut u8 = kmem.mapper().phys_to_ptr(top);
    assert_eq!(unsafe { p.read() }, ALLOC_FILL);

    drop(kmem);
    assert!(ram[3].0.iter().all(|&b| b == ALLOC_FILL));
}

#[test]
fn offset_mapper_adds_the_offset() {
    let mapper = OffsetMapper::new(0xFFFF_8000_0000_0000);
    let p: *mut u8 = mapper.phys_to_ptr(pa(0x1000));
    assert_eq!(p.addr(), 0xFFFF_8000_0000_1000);
}
