use super::builder::BytecodeArrayBuilder;
use super::register::Register;
use std::ops::{Deref, DerefMut};

/// Stack-discipline allocator for temporary registers.
///
/// Temporaries live directly above the locals. Only the most recently
/// borrowed register may be returned, so freed indices are always a suffix
/// and are reused by the next borrow.
#[derive(Debug, Clone, Default)]
pub struct RegisterAllocator {
    first_temporary: i32,
    next: i32,
    high_water_mark: i32,
}

impl RegisterAllocator {
    pub fn new(locals_count: usize) -> Self {
        let first = i32::try_from(locals_count)
            .unwrap_or_else(|_| panic!("{} locals do not fit in a frame", locals_count));
        Self {
            first_temporary: first,
            next: first,
            high_water_mark: first,
        }
    }

    pub fn borrow(&mut self) -> Register {
        let register = Register::new(self.next);
        self.next += 1;
        self.high_water_mark = self.high_water_mark.max(self.next);
        register
    }

    pub fn give_back(&mut self, register: Register) {
        assert!(
            self.next > self.first_temporary && register.index() == self.next - 1,
            "temporary {} returned out of order (next free is r{})",
            register,
            self.next
        );
        self.next -= 1;
    }

    /// First register index that is not a local or a live temporary.
    pub fn next_index(&self) -> i32 {
        self.next
    }

    pub fn outstanding(&self) -> usize {
        (self.next - self.first_temporary) as usize
    }

    /// Most temporaries ever live at once.
    pub fn max_temporaries(&self) -> usize {
        (self.high_water_mark - self.first_temporary) as usize
    }
}

/// Borrows temporaries from a builder for the lifetime of the scope and
/// returns them, newest first, when dropped.
///
/// The scope dereferences to the builder so emission can continue through it.
/// Scopes nest by reborrowing: `TemporaryRegisterScope::new(&mut outer)`.
pub struct TemporaryRegisterScope<'a> {
    builder: &'a mut BytecodeArrayBuilder,
    borrowed: Vec<Register>,
}

impl<'a> TemporaryRegisterScope<'a> {
    pub fn new(builder: &'a mut BytecodeArrayBuilder) -> Self {
        Self {
            builder,
            borrowed: Vec::new(),
        }
    }

    pub fn new_register(&mut self) -> Register {
        let register = self.builder.borrow_temporary_register();
        self.borrowed.push(register);
        register
    }
}

impl Deref for TemporaryRegisterScope<'_> {
    type Target = BytecodeArrayBuilder;

    fn deref(&self) -> &BytecodeArrayBuilder {
        self.builder
    }
}

impl DerefMut for TemporaryRegisterScope<'_> {
    fn deref_mut(&mut self) -> &mut BytecodeArrayBuilder {
        self.builder
    }
}

impl Drop for TemporaryRegisterScope<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            return;
        }
        while let Some(register) = self.borrowed.pop() {
            self.builder.return_temporary_register(register);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder(locals: usize) -> BytecodeArrayBuilder {
        let mut builder = BytecodeArrayBuilder::new();
        builder.set_parameter_count(1).set_locals_count(locals);
        builder
    }

    #[test]
    fn test_allocator_reuses_suffix() {
        let mut allocator = RegisterAllocator::new(2);
        let a = allocator.borrow();
        let b = allocator.borrow();
        assert_eq!((a.index(), b.index()), (2, 3));
        allocator.give_back(b);
        assert_eq!(allocator.borrow().index(), 3);
        assert_eq!(allocator.max_temporaries(), 2);
        assert_eq!(allocator.outstanding(), 2);
    }

    #[test]
    #[should_panic(expected = "out of order")]
    fn test_out_of_order_return_is_fatal() {
        let mut allocator = RegisterAllocator::new(0);
        let a = allocator.borrow();
        let _b = allocator.borrow();
        allocator.give_back(a);
    }

    #[test]
    fn test_nested_scopes_recycle_registers() {
        let mut builder = builder(1);
        let (k1, k2, k2_again) = (2, 3, 2);

        let mut outer = TemporaryRegisterScope::new(&mut builder);
        let outer_regs: Vec<_> = (0..k1).map(|_| outer.new_register()).collect();
        assert_eq!(outer_regs[0].index(), 1);

        let first_inner: Vec<_> = {
            let mut inner = TemporaryRegisterScope::new(&mut outer);
            (0..k2).map(|_| inner.new_register().index()).collect()
        };
        let second_inner: Vec<_> = {
            let mut inner = TemporaryRegisterScope::new(&mut outer);
            let regs: Vec<_> = (0..k2_again).map(|_| inner.new_register().index()).collect();
            inner.load_literal(crate::lang::value::Object::Smi(0)).ret();
            regs
        };
        assert_eq!(first_inner, vec![3, 4, 5]);
        assert_eq!(second_inner, vec![3, 4]);
        drop(outer);

        assert_eq!(builder.temporary_register_count(), k1 + k2.max(k2_again));
        let array = builder.to_bytecode_array();
        assert_eq!(array.register_count(), 1 + k1 + k2.max(k2_again));
    }

    #[test]
    fn test_temporaries_returned_on_drop() {
        let mut builder = builder(0);
        {
            let mut scope = TemporaryRegisterScope::new(&mut builder);
            scope.new_register();
            scope.new_register();
        }
        assert_eq!(builder.borrow_temporary_register().index(), 0);
    }
}
