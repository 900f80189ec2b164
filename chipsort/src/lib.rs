#![no_std]

pub mod stations;

use core::mem::MaybeUninit;
use defmt_rtt as _;
use embedded_alloc::Heap;
use panic_probe as _;

#[global_allocator]
static HEAP: Heap = Heap::empty();

const HEAP_SIZE: usize = 4 * 1024;

pub fn init_heap() {
    static mut HEAP_MEM: [MaybeUninit<u8>; HEAP_SIZE] = [MaybeUninit::uninit(); HEAP_SIZE];
    unsafe { HEAP.init(core::ptr::addr_of_mut!(HEAP_MEM) as usize, HEAP_SIZE) }
}

#[defmt::panic_handler]
fn panic() -> ! {
    cortex_m::asm::udf()
}
