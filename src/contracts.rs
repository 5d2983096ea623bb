//! Centralized Contract Definitions
//!
//! Solidity interfaces for the limit-order router, the swap router venue
//! registry, Uniswap V2/V3 venues, the V3 quoter and ERC20, defined with
//! alloy's `sol!` macro.
//!
//! Each interface is annotated with `#[sol(rpc)]` to generate
//! contract instance types that can make RPC calls via any alloy Provider.
//!
//! Created: 2026-10-18

use alloy::sol;

// ── ERC20 ─────────────────────────────────────────────────────────────

sol! {
    #[sol(rpc)]
    interface IERC20 {
        function decimals() external view returns (uint8);
    }
}

// ── Limit Order Router ───────────────────────────────────────────────

sol! {
    #[sol(rpc)]
    interface ILimitOrderRouter {
        struct LimitOrder {
            bool buy;
            bool taxed;
            bool stopLoss;
            uint32 lastRefreshTimestamp;
            uint32 expirationTimestamp;
            uint32 feeIn;
            uint32 feeOut;
            uint16 taxIn;
            uint128 price;
            uint128 amountOutMin;
            uint128 quantity;
            address owner;
            address tokenIn;
            address tokenOut;
            bytes32 orderId;
        }

        event OrderPlaced(bytes32[] orderIds);
        event OrderCancelled(bytes32[] orderIds);
        event OrderUpdated(bytes32[] orderIds);
        event OrderRefreshed(bytes32[] orderIds);
        event GasCreditEvent(address indexed sender, uint256 indexed balance);

        function getOrderById(bytes32 orderId) external view returns (LimitOrder memory order);
        function executeOrderGroups(bytes32[][] calldata orderGroups) external;
    }
}

// ── Swap Router (venue registry) ─────────────────────────────────────

sol! {
    #[sol(rpc)]
    interface ISwapRouter {
        function dexes(uint256 index) external view returns (address factoryAddress, bytes32 initBytecode, bool isUniV2);
    }
}

// ── Uniswap V2 ───────────────────────────────────────────────────────

sol! {
    #[sol(rpc)]
    interface IUniswapV2Factory {
        function getPair(address tokenA, address tokenB) external view returns (address pair);
    }
}

sol! {
    #[sol(rpc)]
    interface IUniswapV2Pair {
        event Sync(uint112 reserve0, uint112 reserve1);

        function getReserves() external view returns (uint112 reserve0, uint112 reserve1, uint32 blockTimestampLast);
        function token0() external view returns (address);
    }
}

// ── Uniswap V3 ───────────────────────────────────────────────────────

sol! {
    #[sol(rpc)]
    interface UniswapV3Factory {
        function getPool(address tokenA, address tokenB, uint24 fee) external view returns (address pool);
    }
}

sol! {
    #[sol(rpc)]
    interface UniswapV3Pool {
        event Swap(address indexed sender, address indexed recipient, int256 amount0, int256 amount1, uint160 sqrtPriceX96, uint128 liquidity, int24 tick);

        function slot0() external view returns (uint160 sqrtPriceX96, int24 tick, uint16 observationIndex, uint16 observationCardinality, uint16 observationCardinalityNext, uint8 feeProtocol, bool unlocked);
        function liquidity() external view returns (uint128);
        function token0() external view returns (address);
    }
}

sol! {
    #[sol(rpc)]
    interface IQuoter {
        function quoteExactInputSingle(address tokenIn, address tokenOut, uint24 fee, uint256 amountIn, uint160 sqrtPriceLimitX96) external returns (uint256 amountOut);
    }
}

/// Convert a u32 fee tier to alloy's uint24 type for contract calls.
/// Uses from_limbs() because Uint<24, 1> doesn't impl From<u32>.
pub fn fee_to_u24(fee: u32) -> alloy::primitives::Uint<24, 1> {
    alloy::primitives::Uint::from_limbs([u64::from(fee & 0x00FF_FFFF)])
}
