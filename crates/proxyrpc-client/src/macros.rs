/// Declares a contract and generates its typed clients.
///
/// ```
/// use proxyrpc_client::contract;
///
/// contract! {
///     /// Liveness checks.
///     pub contract Health {
///         client HealthClient;
///         blocking HealthBlockingClient;
///
///         fn ping() -> String;
///     }
/// }
///
/// contract! {
///     pub contract Catalog: Health {
///         client CatalogClient;
///         blocking CatalogBlockingClient;
///
///         fn get_value(id: i32) -> String;
///         fn set_value(id: i32, value: String);
///         fn transfer(from: i32, to: i32) -> bool where non_idempotent;
///     }
/// }
///
/// use proxyrpc_client::Contract;
/// let descriptor = Catalog::descriptor().unwrap();
/// assert_eq!(descriptor.len(), 4);
/// ```
///
/// This expands to:
///
/// - a marker type (`Catalog`) implementing [`Contract`](crate::Contract),
///   whose id is its module path plus name
/// - [`Extends`](crate::Extends) impls for every listed parent
/// - an async client (`CatalogClient<C>`) with one `async fn` per operation
///   and a `view::<Parent>()` method for reaching inherited operations
/// - a blocking client (`CatalogBlockingClient<C>`) with the same methods
///
/// Operations without a return type are void. Operations are idempotent
/// unless marked `where non_idempotent`.
#[macro_export]
macro_rules! contract {
    (@ret) => { () };
    (@ret $ret:ty) => { $ret };

    (@idempotent) => { true };
    (@idempotent non_idempotent) => { false };

    (
        $(#[$cmeta:meta])*
        $vis:vis contract $name:ident $(: $($parent:path),+)? {
            client $client:ident;
            blocking $blocking:ident;

            $(
                $(#[$ometa:meta])*
                fn $op:ident ( $($arg:ident : $argty:ty),* $(,)? ) $(-> $ret:ty)? $(where $flag:ident)? ;
            )*
        }
    ) => {
        $(#[$cmeta])*
        $vis enum $name {}

        impl $crate::Contract for $name {
            type Client<C: $crate::__private::Connector> = $client<C>;
            type BlockingClient<C: $crate::__private::Connector> = $blocking<C>;

            fn declaration() -> ::std::sync::Arc<$crate::__private::ContractDeclaration> {
                static DECLARATION: ::std::sync::OnceLock<
                    ::std::sync::Arc<$crate::__private::ContractDeclaration>,
                > = ::std::sync::OnceLock::new();

                DECLARATION
                    .get_or_init(|| {
                        let declaration = $crate::__private::ContractDeclaration::new(
                            concat!(module_path!(), "::", stringify!($name)),
                        );
                        $($(
                            let declaration = declaration
                                .extends(<$parent as $crate::Contract>::declaration());
                        )+)?
                        $(
                            let declaration = declaration.operation(
                                $crate::__private::OperationDescriptor::new(stringify!($op))
                                    $(.param::<$argty>())*
                                    .returns::<$crate::contract!(@ret $($ret)?)>()
                                    .idempotent($crate::contract!(@idempotent $($flag)?)),
                            );
                        )*
                        ::std::sync::Arc::new(declaration)
                    })
                    .clone()
            }

            fn descriptor() -> ::std::result::Result<
                ::std::sync::Arc<$crate::__private::ContractDescriptor>,
                $crate::__private::ContractDescriptorError,
            > {
                static DESCRIPTOR: ::std::sync::OnceLock<
                    ::std::result::Result<
                        ::std::sync::Arc<$crate::__private::ContractDescriptor>,
                        $crate::__private::ContractDescriptorError,
                    >,
                > = ::std::sync::OnceLock::new();

                DESCRIPTOR
                    .get_or_init(|| {
                        <$name as $crate::Contract>::declaration()
                            .build()
                            .map(::std::sync::Arc::new)
                    })
                    .clone()
            }
        }

        $($(
            impl $crate::Extends<$parent> for $name {}
        )+)?

        #[doc = concat!("Async client for [`", stringify!($name), "`].")]
        $vis struct $client<C: $crate::__private::Connector> {
            proxy: $crate::Proxy<C>,
        }

        impl<C: $crate::__private::Connector> ::std::convert::From<$crate::Proxy<C>> for $client<C> {
            fn from(proxy: $crate::Proxy<C>) -> Self {
                Self { proxy }
            }
        }

        impl<C: $crate::__private::Connector> ::std::clone::Clone for $client<C> {
            fn clone(&self) -> Self {
                Self { proxy: self.proxy.clone() }
            }
        }

        impl<C: $crate::__private::Connector> $client<C> {
            /// The underlying proxy.
            pub fn proxy(&self) -> &$crate::Proxy<C> {
                &self.proxy
            }

            /// Views this client as a client of a parent contract.
            pub fn view<P: $crate::Contract>(&self) -> <P as $crate::Contract>::Client<C>
            where
                $name: $crate::Extends<P>,
            {
                ::std::convert::From::from(self.proxy.clone())
            }

            $(
                $(#[$ometa])*
                pub async fn $op(&self $(, $arg: $argty)*) -> $crate::Result<$crate::contract!(@ret $($ret)?)> {
                    let args = self.proxy.args(stringify!($op))? $(.push(&$arg)?)* .finish();
                    self.proxy.call(stringify!($op), args).await
                }
            )*
        }

        #[doc = concat!("Blocking client for [`", stringify!($name), "`].")]
        $vis struct $blocking<C: $crate::__private::Connector> {
            proxy: $crate::BlockingProxy<C>,
        }

        impl<C: $crate::__private::Connector> ::std::convert::From<$crate::BlockingProxy<C>> for $blocking<C> {
            fn from(proxy: $crate::BlockingProxy<C>) -> Self {
                Self { proxy }
            }
        }

        impl<C: $crate::__private::Connector> ::std::clone::Clone for $blocking<C> {
            fn clone(&self) -> Self {
                Self { proxy: self.proxy.clone() }
            }
        }

        impl<C: $crate::__private::Connector> $blocking<C> {
            /// The underlying blocking proxy.
            pub fn proxy(&self) -> &$crate::BlockingProxy<C> {
                &self.proxy
            }

            /// Views this client as a client of a parent contract.
            pub fn view<P: $crate::Contract>(&self) -> <P as $crate::Contract>::BlockingClient<C>
            where
                $name: $crate::Extends<P>,
            {
                ::std::convert::From::from(self.proxy.clone())
            }

            $(
                $(#[$ometa])*
                pub fn $op(&self $(, $arg: $argty)*) -> $crate::Result<$crate::contract!(@ret $($ret)?)> {
                    let args = self.proxy.args(stringify!($op))? $(.push(&$arg)?)* .finish();
                    self.proxy.call(stringify!($op), args)
                }
            )*
        }
    };
}
