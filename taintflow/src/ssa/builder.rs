//! Programmatic construction of SSA programs.
//!
//! Front ends (and the test suite) declare functions first so call sites can
//! reference their ids, then fill bodies through [`FunctionBuilder`].

use super::program::{
    Block, BlockId, CallExpr, Callee, FuncId, Function, Node, NodeId, NodeKind, Pos, Program,
};
use super::types::{BasicKind, Signature, StructField, Type, TypeId};
use compact_str::CompactString;

/// Builds a [`Program`] incrementally.
#[derive(Debug, Default)]
pub struct ProgramBuilder {
    program: Program,
}

impl ProgramBuilder {
    /// A fresh, empty program.
    #[must_use]
    pub fn new() -> ProgramBuilder {
        ProgramBuilder::default()
    }

    /// Registers a file name and returns its table index.
    pub fn file(&mut self, name: &str) -> u32 {
        if let Some(i) = self.program.files.iter().position(|f| f == name) {
            return u32::try_from(i).unwrap_or(0);
        }
        self.program.files.push(CompactString::from(name));
        u32::try_from(self.program.files.len() - 1).unwrap_or(0)
    }

    /// Interns a basic type.
    pub fn ty_basic(&mut self, kind: BasicKind) -> TypeId {
        self.program.types.intern(Type::Basic(kind))
    }

    /// Interns a named type over an underlying type.
    pub fn ty_named(&mut self, package: &str, name: &str, underlying: TypeId) -> TypeId {
        self.program.types.intern(Type::Named {
            package: CompactString::from(package),
            name: CompactString::from(name),
            underlying,
        })
    }

    /// Interns a pointer type.
    pub fn ty_pointer(&mut self, elem: TypeId) -> TypeId {
        self.program.types.intern(Type::Pointer(elem))
    }

    /// Interns a slice type.
    pub fn ty_slice(&mut self, elem: TypeId) -> TypeId {
        self.program.types.intern(Type::Slice(elem))
    }

    /// Interns a map type.
    pub fn ty_map(&mut self, key: TypeId, value: TypeId) -> TypeId {
        self.program.types.intern(Type::Map { key, value })
    }

    /// Interns a channel type.
    pub fn ty_chan(&mut self, elem: TypeId) -> TypeId {
        self.program.types.intern(Type::Chan(elem))
    }

    /// Interns a struct type.
    pub fn ty_struct(&mut self, fields: Vec<StructField>) -> TypeId {
        self.program.types.intern(Type::Struct { fields })
    }

    /// Interns an interface type.
    pub fn ty_interface(&mut self, methods: Vec<super::types::InterfaceMethod>) -> TypeId {
        self.program.types.intern(Type::Interface { methods })
    }

    /// Interns a result tuple type.
    pub fn ty_tuple(&mut self, elems: Vec<TypeId>) -> TypeId {
        self.program.types.intern(Type::Tuple(elems))
    }

    /// Interns an arbitrary type.
    pub fn ty(&mut self, ty: Type) -> TypeId {
        self.program.types.intern(ty)
    }

    /// Shorthand for a struct field.
    #[must_use]
    pub fn field(name: &str, ty: TypeId, tag: &str) -> StructField {
        StructField {
            name: CompactString::from(name),
            ty,
            tag: CompactString::from(tag),
        }
    }

    /// Adds a package and returns its index.
    pub fn package(&mut self, path: &str) -> usize {
        self.program.packages.push(super::program::Package {
            path: CompactString::from(path),
            functions: Vec::new(),
        });
        self.program.packages.len() - 1
    }

    /// Declares a function in a package. The body is filled later through
    /// [`FunctionBuilder`].
    pub fn declare_function(
        &mut self,
        package: usize,
        name: &str,
        receiver: Option<&str>,
        sig: Signature,
    ) -> FuncId {
        let path = self.program.packages[package].path.clone();
        let id = FuncId(u32::try_from(self.program.functions.len()).unwrap_or(u32::MAX));
        self.program.functions.push(Function {
            name: CompactString::from(name),
            package: path,
            receiver: receiver.map(CompactString::from),
            sig,
            params: Vec::new(),
            free_vars: Vec::new(),
            nodes: Vec::new(),
            blocks: Vec::new(),
            entry: BlockId(0),
            recover_block: None,
            is_external: false,
        });
        self.program.packages[package].functions.push(id);
        id
    }

    /// Declares a body-less external function (standard-library style).
    pub fn external_function(
        &mut self,
        package: usize,
        name: &str,
        receiver: Option<&str>,
        sig: Signature,
    ) -> FuncId {
        let id = self.declare_function(package, name, receiver, sig);
        self.program.functions[id.0 as usize].is_external = true;
        id
    }

    /// Consumes the builder and returns the finished program.
    #[must_use]
    pub fn finish(self) -> Program {
        self.program
    }

    pub(crate) fn function_mut(&mut self, id: FuncId) -> &mut Function {
        &mut self.program.functions[id.0 as usize]
    }
}

/// Fills the body of one declared function.
///
/// Instructions are appended to blocks in program order; `at` sets the
/// position stamped on subsequently pushed nodes.
pub struct FunctionBuilder<'a> {
    pb: &'a mut ProgramBuilder,
    id: FuncId,
    cur_pos: Pos,
}

impl<'a> FunctionBuilder<'a> {
    /// Starts building the body of `id`.
    pub fn new(pb: &'a mut ProgramBuilder, id: FuncId) -> FunctionBuilder<'a> {
        FunctionBuilder { pb, id, cur_pos: Pos::NONE }
    }

    /// Sets the position for subsequent nodes.
    pub fn at(&mut self, file: u32, line: u32, col: u32) -> &mut Self {
        self.cur_pos = Pos { file, line, col };
        self
    }

    /// Appends a new basic block.
    pub fn block(&mut self) -> BlockId {
        let f = self.pb.function_mut(self.id);
        f.blocks.push(Block::default());
        BlockId(u32::try_from(f.blocks.len() - 1).unwrap_or(u32::MAX))
    }

    /// Marks a block as the recovery block.
    pub fn set_recover_block(&mut self, b: BlockId) {
        self.pb.function_mut(self.id).recover_block = Some(b);
    }

    fn add_node(&mut self, kind: NodeKind, ty: TypeId) -> NodeId {
        let pos = self.cur_pos;
        let f = self.pb.function_mut(self.id);
        f.nodes.push(Node { kind, ty, pos });
        NodeId(u32::try_from(f.nodes.len() - 1).unwrap_or(u32::MAX))
    }

    /// Declares the next parameter.
    pub fn param(&mut self, ty: TypeId) -> NodeId {
        let index = u32::try_from(self.pb.function_mut(self.id).params.len()).unwrap_or(u32::MAX);
        let n = self.add_node(NodeKind::Param { index }, ty);
        self.pb.function_mut(self.id).params.push(n);
        n
    }

    /// Declares the next free variable (closure capture).
    pub fn free_var(&mut self, ty: TypeId) -> NodeId {
        let index =
            u32::try_from(self.pb.function_mut(self.id).free_vars.len()).unwrap_or(u32::MAX);
        let n = self.add_node(NodeKind::FreeVar { index }, ty);
        self.pb.function_mut(self.id).free_vars.push(n);
        n
    }

    /// Adds a constant value node.
    pub fn constant(&mut self, value: &str, ty: TypeId) -> NodeId {
        self.add_node(NodeKind::Const { value: CompactString::from(value) }, ty)
    }

    /// Adds a global reference node; `ty` is the address type.
    pub fn global(&mut self, package: &str, name: &str, ty: TypeId) -> NodeId {
        self.add_node(
            NodeKind::Global {
                package: CompactString::from(package),
                name: CompactString::from(name),
            },
            ty,
        )
    }

    /// Appends an instruction to a block.
    pub fn push(&mut self, b: BlockId, kind: NodeKind, ty: TypeId) -> NodeId {
        let n = self.add_node(kind, ty);
        self.pb.function_mut(self.id).blocks[b.0 as usize].instrs.push(n);
        n
    }

    /// Appends a static call.
    pub fn call_static(
        &mut self,
        b: BlockId,
        callee: FuncId,
        args: Vec<NodeId>,
        result_ty: TypeId,
    ) -> NodeId {
        self.push(
            b,
            NodeKind::Call(CallExpr { callee: Callee::Static(callee), args }),
            result_ty,
        )
    }

    /// Appends an invoke-style call through an interface receiver.
    pub fn call_invoke(
        &mut self,
        b: BlockId,
        recv: NodeId,
        method: &str,
        args: Vec<NodeId>,
        result_ty: TypeId,
    ) -> NodeId {
        self.push(
            b,
            NodeKind::Call(CallExpr {
                callee: Callee::Invoke { recv, method: CompactString::from(method) },
                args,
            }),
            result_ty,
        )
    }

    /// Appends a return.
    pub fn ret(&mut self, b: BlockId, results: Vec<NodeId>, void_ty: TypeId) -> NodeId {
        self.push(b, NodeKind::Return { results }, void_ty)
    }

    /// Appends an unconditional jump.
    pub fn jump(&mut self, b: BlockId, target: BlockId, void_ty: TypeId) -> NodeId {
        self.push(b, NodeKind::Jump { target }, void_ty)
    }

    /// Appends a conditional branch.
    pub fn cond_br(
        &mut self,
        b: BlockId,
        cond: NodeId,
        then_block: BlockId,
        else_block: BlockId,
        void_ty: TypeId,
    ) -> NodeId {
        self.push(b, NodeKind::CondBranch { cond, then_block, else_block }, void_ty)
    }

    /// Finishes the body. The entry is the first block.
    pub fn finish(self) {
        let f = self.pb.function_mut(self.id);
        f.entry = BlockId(0);
    }
}
